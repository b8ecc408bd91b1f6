use log::debug;
use ndarray::{concatenate, s, Array3, ArrayView2, Axis};

use crate::{distance::DistanceFn, error::Result, table::Table};

/// How the distance tensor of a partition is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceLayout {
    /// One reduced distance per `(sample, reference)` pair, a second channel
    /// for the temporal distance when temporal columns exist.
    Simple,
    /// The raw coordinates of both sides, `[sample | reference]` on the last
    /// axis, temporal coordinates appended after the spatial ones.
    Full,
    /// Spatial coordinate pairs as in `Full`, temporal pairs kept in a
    /// separate tensor.
    Stnn,
}

impl DistanceLayout {
    pub fn new(is_need_stnn: bool, simple_distance: bool) -> Self {
        match (is_need_stnn, simple_distance) {
            (true, _) => DistanceLayout::Stnn,
            (false, true) => DistanceLayout::Simple,
            (false, false) => DistanceLayout::Full,
        }
    }
}

/// The columns and metrics distances are computed with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DistanceSource<'a> {
    pub spatial_columns: &'a [String],
    pub temporal_columns: Option<&'a [String]>,
    pub spatial_fn: DistanceFn,
    pub temporal_fn: DistanceFn,
}

/// The distance tensors of one partition, before scaling.
#[derive(Debug)]
pub(crate) struct Assembled {
    pub distances: Array3<f32>,
    pub temporal: Option<Array3<f32>>,
}

/// Measures every row of `points` against every row of `reference`.
///
/// The single routine behind every partition of every layout, with or
/// without temporal columns.
pub(crate) fn assemble(
    points: &Table,
    reference: &Table,
    layout: DistanceLayout,
    source: DistanceSource<'_>,
) -> Result<Assembled> {
    let spatial = (
        points.select(source.spatial_columns)?,
        reference.select(source.spatial_columns)?,
    );
    let temporal = match source.temporal_columns {
        Some(cols) => Some((points.select(cols)?, reference.select(cols)?)),
        None => None,
    };

    let assembled = match layout {
        DistanceLayout::Simple => {
            let d = (source.spatial_fn)(spatial.0.view(), spatial.1.view()).insert_axis(Axis(2));
            let distances = match temporal {
                Some((p, r)) => {
                    let t = (source.temporal_fn)(p.view(), r.view()).insert_axis(Axis(2));
                    concatenate(Axis(2), &[d.view(), t.view()])?
                }
                None => d,
            };

            Assembled {
                distances,
                temporal: None,
            }
        }
        DistanceLayout::Full => {
            let d = coordinate_pairs(spatial.0.view(), spatial.1.view());
            let distances = match temporal {
                Some((p, r)) => {
                    let t = coordinate_pairs(p.view(), r.view());
                    concatenate(Axis(2), &[d.view(), t.view()])?
                }
                None => d,
            };

            Assembled {
                distances,
                temporal: None,
            }
        }
        DistanceLayout::Stnn => Assembled {
            distances: coordinate_pairs(spatial.0.view(), spatial.1.view()),
            temporal: temporal.map(|(p, r)| coordinate_pairs(p.view(), r.view())),
        },
    };

    debug!(
        "assembled {layout:?} distances {:?} (temporal {:?})",
        assembled.distances.dim(),
        assembled.temporal.as_ref().map(|t| t.dim())
    );

    Ok(assembled)
}

/// `out[i, j] = [points[i] | reference[j]]`
fn coordinate_pairs(points: ArrayView2<f32>, reference: ArrayView2<f32>) -> Array3<f32> {
    let (n, dp) = points.dim();
    let (r, dr) = reference.dim();

    let mut out = Array3::zeros((n, r, dp + dr));
    out.slice_mut(s![.., .., ..dp])
        .assign(&points.insert_axis(Axis(1)));
    out.slice_mut(s![.., .., dp..])
        .assign(&reference.insert_axis(Axis(0)));

    out
}

/// Joins per-partition tensors along the sample axis.
pub(crate) fn stack(tensors: &[&Array3<f32>]) -> Result<Array3<f32>> {
    let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
    Ok(concatenate(Axis(0), &views)?)
}

/// Splits a stacked tensor back into consecutive blocks of the given lengths.
pub(crate) fn unstack(stacked: Array3<f32>, lens: &[usize]) -> Vec<Array3<f32>> {
    let mut start = 0;
    lens.iter()
        .map(|&len| {
            let block = stacked.slice(s![start..start + len, .., ..]).to_owned();
            start += len;
            block
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{euclidean, manhattan};
    use ndarray::array;

    fn tables() -> (Table, Table) {
        let cols = ["u", "v", "t"].map(String::from).to_vec();
        let points =
            Table::new(cols.clone(), array![[0., 0., 1.], [3., 4., 5.], [1., 1., 2.]]).unwrap();
        let reference = Table::new(cols, array![[0., 0., 0.], [3., 0., 4.]]).unwrap();
        (points, reference)
    }

    fn source<'a>(spatial: &'a [String], temporal: Option<&'a [String]>) -> DistanceSource<'a> {
        DistanceSource {
            spatial_columns: spatial,
            temporal_columns: temporal,
            spatial_fn: euclidean,
            temporal_fn: manhattan,
        }
    }

    #[test]
    fn simple_without_temporal_has_one_channel() {
        let (p, r) = tables();
        let spatial = ["u", "v"].map(String::from);
        let a = assemble(&p, &r, DistanceLayout::Simple, source(&spatial, None)).unwrap();

        assert_eq!(a.distances.dim(), (3, 2, 1));
        assert_eq!(a.distances[[1, 0, 0]], 5.);
        assert_eq!(a.distances[[1, 1, 0]], 4.);
        assert!(a.temporal.is_none());
    }

    #[test]
    fn simple_with_temporal_stacks_channels() {
        let (p, r) = tables();
        let spatial = ["u", "v"].map(String::from);
        let temporal = ["t".to_string()];
        let src = source(&spatial, Some(&temporal[..]));
        let a = assemble(&p, &r, DistanceLayout::Simple, src).unwrap();

        assert_eq!(a.distances.dim(), (3, 2, 2));
        assert_eq!(a.distances.slice(s![1, 1, ..]).to_vec(), vec![4., 1.]);
    }

    #[test]
    fn full_keeps_raw_coordinate_pairs() {
        let (p, r) = tables();
        let spatial = ["u", "v"].map(String::from);
        let a = assemble(&p, &r, DistanceLayout::Full, source(&spatial, None)).unwrap();

        assert_eq!(a.distances.dim(), (3, 2, 4));
        assert_eq!(a.distances.slice(s![1, 1, ..]).to_vec(), vec![3., 4., 3., 0.]);

        let temporal = ["t".to_string()];
        let src = source(&spatial, Some(&temporal[..]));
        let a = assemble(&p, &r, DistanceLayout::Full, src).unwrap();
        assert_eq!(a.distances.dim(), (3, 2, 6));
        assert_eq!(a.distances.slice(s![2, 1, ..]).to_vec(), vec![1., 1., 3., 0., 2., 4.]);
    }

    #[test]
    fn stnn_keeps_temporal_apart() {
        let (p, r) = tables();
        let spatial = ["u", "v"].map(String::from);
        let temporal = ["t".to_string()];
        let src = source(&spatial, Some(&temporal[..]));
        let a = assemble(&p, &r, DistanceLayout::Stnn, src).unwrap();

        assert_eq!(a.distances.dim(), (3, 2, 4));
        let t = a.temporal.unwrap();
        assert_eq!(t.dim(), (3, 2, 2));
        assert_eq!(t.slice(s![0, 1, ..]).to_vec(), vec![1., 4.]);
    }

    #[test]
    fn stack_then_unstack() {
        let a = Array3::from_elem((2, 3, 1), 1f32);
        let b = Array3::from_elem((0, 3, 1), 2f32);
        let c = Array3::from_elem((1, 3, 1), 3f32);

        let stacked = stack(&[&a, &b, &c]).unwrap();
        assert_eq!(stacked.dim(), (3, 3, 1));

        let parts = unstack(stacked, &[2, 0, 1]);
        assert_eq!(parts, vec![a, b, c]);
    }
}
