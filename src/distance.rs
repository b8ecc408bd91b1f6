use ndarray::{Array2, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// A pairwise distance function: `(A, B) -> D` with `D[i, j] = dist(A[i], B[j])`.
pub type DistanceFn = fn(ArrayView2<f32>, ArrayView2<f32>) -> Array2<f32>;

/// The named metrics available to configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Euclidean,
    Manhattan,
}

impl Metric {
    pub fn as_fn(self) -> DistanceFn {
        match self {
            Metric::Euclidean => euclidean,
            Metric::Manhattan => manhattan,
        }
    }
}

/// Euclidean distance between every row of `a` and every row of `b`.
///
/// This is the default spatial metric.
///
/// # Panics
/// If `a` and `b` don't have the same number of columns.
pub fn euclidean(a: ArrayView2<f32>, b: ArrayView2<f32>) -> Array2<f32> {
    pairwise(a, b, |p, q| {
        p.iter()
            .zip(q)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    })
}

/// Manhattan (L1) distance between every row of `a` and every row of `b`.
///
/// This is the default temporal metric.
///
/// # Panics
/// If `a` and `b` don't have the same number of columns.
pub fn manhattan(a: ArrayView2<f32>, b: ArrayView2<f32>) -> Array2<f32> {
    pairwise(a, b, |p, q| p.iter().zip(q).map(|(x, y)| (x - y).abs()).sum())
}

fn pairwise<F>(a: ArrayView2<f32>, b: ArrayView2<f32>, dist: F) -> Array2<f32>
where
    F: Fn(ArrayView1<f32>, ArrayView1<f32>) -> f32 + Sync,
{
    assert_eq!(
        a.ncols(),
        b.ncols(),
        "both coordinate sets must have the same dimension"
    );

    let mut out = Array2::zeros((a.nrows(), b.nrows()));
    Zip::from(out.rows_mut())
        .and(a.rows())
        .par_for_each(|mut row, p| {
            row.iter_mut()
                .zip(b.rows())
                .for_each(|(d, q)| *d = dist(p, q));
        });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn euclidean_non_square() {
        let a = array![[0f32, 0.], [3., 4.]];
        let b = array![[0f32, 0.], [0., 4.], [3., 0.]];

        let d = euclidean(a.view(), b.view());
        assert_eq!(d.dim(), (2, 3));
        assert_abs_diff_eq!(d, array![[0f32, 4., 3.], [5., 3., 4.]], epsilon = 1e-6);
    }

    #[test]
    fn manhattan_is_l1() {
        let a = array![[1f32], [5.]];
        let b = array![[2f32], [0.], [5.]];

        let d = manhattan(a.view(), b.view());
        assert_eq!(d, array![[1f32, 1., 4.], [3., 5., 0.]]);
    }

    #[test]
    fn swapping_arguments_transposes() {
        let a = array![[0.5f32, 1.5], [2., -1.], [7., 3.]];
        let b = array![[1f32, 1.], [0., 0.]];

        for metric in [Metric::Euclidean, Metric::Manhattan] {
            let f = metric.as_fn();
            assert_eq!(f(a.view(), b.view()), f(b.view(), a.view()).t());
        }
    }

    #[test]
    #[should_panic(expected = "same dimension")]
    fn mismatched_widths_panic() {
        let a = array![[0f32, 0.]];
        let b = array![[0f32]];
        euclidean(a.view(), b.view());
    }

    #[test]
    fn metric_names() {
        let m: Metric = serde_json::from_str("\"manhattan\"").unwrap();
        assert_eq!(m, Metric::Manhattan);
    }
}
