mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array1;

use common::{config, observations};
use gnnwr_datasets::{
    init_dataset,
    view::{FittedResult, ResultView, Subset},
    DatasetErr, Partitions, PartitionedDataset, Table,
};

struct Fitted {
    parts: Partitions,
    result: Table,
}

impl Fitted {
    fn new(n: usize) -> Self {
        let parts = init_dataset(&observations(n), &config()).unwrap();
        let coef = Array1::from_iter((0..parts.train.size()).map(|i| i as f64 / 10.));
        let result = parts.train.frame().clone().with_column("coef", coef).unwrap();
        Self { parts, result }
    }
}

impl FittedResult for Fitted {
    fn train_partition(&self) -> &PartitionedDataset {
        &self.parts.train
    }

    fn valid_partition(&self) -> &PartitionedDataset {
        &self.parts.valid
    }

    fn test_partition(&self) -> &PartitionedDataset {
        &self.parts.test
    }

    fn result_table(&self) -> &Table {
        &self.result
    }
}

#[test]
fn falls_back_to_spatial_columns() {
    let fitted = Fitted::new(100);
    let view = ResultView::new(&fitted, None).unwrap();

    assert_eq!(view.lon_lat(), ("lon", "lat"));

    let raw = observations(100);
    let (lon, lat) = view.center();
    assert_abs_diff_eq!(lon, raw.column("lon").unwrap().mean().unwrap(), epsilon = 1e-9);
    assert_abs_diff_eq!(lat, raw.column("lat").unwrap().mean().unwrap(), epsilon = 1e-9);
}

#[test]
fn subsets_and_ranges() {
    let fitted = Fitted::new(100);
    let view = ResultView::new(&fitted, Some(("lon".into(), "lat".into()))).unwrap();

    assert_eq!(view.select(Subset::All).unwrap().len(), 100);
    assert_eq!(view.select(Subset::Valid).unwrap().len(), 10);

    let (lo, hi) = view.value_range(Subset::All, Some("x1")).unwrap();
    assert_eq!((lo, hi), (0., 99.));

    let (lo, hi) = view.value_range(Subset::Test, None).unwrap();
    let y = fitted.parts.test.frame().column("y").unwrap();
    assert_eq!(lo, y.fold(f64::INFINITY, |a, &b| a.min(b)));
    assert_eq!(hi, y.fold(f64::NEG_INFINITY, |a, &b| a.max(b)));
}

#[test]
fn heat_points_read_the_result_table() {
    let fitted = Fitted::new(50);
    let view = ResultView::new(&fitted, None).unwrap();

    let points = view.heat_points("coef").unwrap();
    assert_eq!(points.len(), fitted.parts.train.size());

    let frame = fitted.parts.train.frame();
    assert_eq!(
        points[3],
        [
            frame.column("lat").unwrap()[3],
            frame.column("lon").unwrap()[3],
            0.3
        ]
    );

    assert!(matches!(
        view.heat_points("missing"),
        Err(DatasetErr::InvalidArgument(_))
    ));
}

#[test]
fn unknown_lon_lat_columns() {
    let fitted = Fitted::new(30);
    assert!(matches!(
        ResultView::new(&fitted, Some(("east".into(), "north".into()))),
        Err(DatasetErr::InvalidArgument(_))
    ));
}
