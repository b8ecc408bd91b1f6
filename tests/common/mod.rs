#![allow(dead_code)]

use gnnwr_datasets::{BuildConfig, Table};
use ndarray::Array2;

pub const COLUMNS: [&str; 6] = ["x1", "x2", "y", "lon", "lat", "t"];

/// `n` observations on a 10-wide grid with two features, a label and a time stamp.
pub fn observations(n: usize) -> Table {
    let data = Array2::from_shape_fn((n, COLUMNS.len()), |(i, j)| {
        let x1 = i as f64;
        let x2 = (i * 37 % 101) as f64 / 3.;
        match j {
            0 => x1,
            1 => x2,
            2 => 2. * x1 + x2,
            3 => 100. + (i % 10) as f64 * 0.5,
            4 => 30. + (i / 10) as f64 * 0.3,
            _ => (i % 7) as f64,
        }
    });

    Table::new(COLUMNS.map(String::from).to_vec(), data).unwrap()
}

pub fn config() -> BuildConfig {
    BuildConfig::new(
        vec!["x1".into(), "x2".into()],
        vec!["y".into()],
        vec!["lon".into(), "lat".into()],
    )
}

pub fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids
}
