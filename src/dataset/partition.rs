use std::sync::Arc;

use ndarray::{concatenate, s, Array1, Array2, Array3, ArrayView2, Axis};

use super::{gather_distances, Columns, DataLoader, LoaderSpec, ReferenceSet};
use crate::{
    error::{DatasetErr, Result},
    scaling::{ScaleKind, ScaleParams},
    table::Table,
};

/// A single supervised sample as consumed by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// `r × c` distances (or coordinate pairs) to every reference row.
    pub distances: Array2<f32>,
    /// `p + 1` scaled features, bias last.
    pub x: Array1<f32>,
    pub y: Array1<f32>,
    pub id: i64,
}

/// One split (train, validation or test) of an observation table.
///
/// Row `i` of the features, labels, ids and distance tensor always refer to
/// the same observation. Once a build hands it out the reference set and the
/// scaling parameters never change, the only later mutation is attaching a
/// loader spec.
#[derive(Debug, Clone)]
pub struct PartitionedDataset {
    frame: Table,
    columns: Columns,
    is_need_stnn: bool,
    simple_distance: bool,

    x_data: Array2<f32>,
    y_data: Array2<f32>,
    id_data: Array1<i64>,
    distances: Array3<f32>,
    temporal: Option<Array3<f32>>,

    x_scale: Option<ScaleParams>,
    y_scale: Option<ScaleParams>,
    scaled_frame: Option<Table>,
    distance_scale: Option<ScaleParams>,
    reference: Option<Arc<ReferenceSet>>,
    loader: Option<LoaderSpec>,
}

impl PartitionedDataset {
    /// Creates a new unscaled `PartitionedDataset` without distances.
    ///
    /// # Arguments
    /// * `frame` - The raw rows of this split.
    /// * `columns` - The role of each column, all must be present in `frame`.
    /// * `is_need_stnn` - Whether the STNN coordinate-pair layout is used.
    /// * `simple_distance` - Whether distances are reduced to scalars.
    pub fn new(
        frame: Table,
        columns: Columns,
        is_need_stnn: bool,
        simple_distance: bool,
    ) -> Result<Self> {
        let x_data = frame.select(&columns.x)?;
        let y_data = frame.select(&columns.y)?;
        let id_data = frame
            .column(&columns.id)?
            .iter()
            .map(|&v| v as i64)
            .collect();
        let n = frame.len();

        Ok(Self {
            frame,
            columns,
            is_need_stnn,
            simple_distance,
            x_data,
            y_data,
            id_data,
            distances: Array3::zeros((n, 0, 0)),
            temporal: None,
            x_scale: None,
            y_scale: None,
            scaled_frame: None,
            distance_scale: None,
            reference: None,
            loader: None,
        })
    }

    /// The number of samples.
    #[inline]
    pub fn size(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The number of model coefficients: one per feature plus the bias.
    #[inline]
    pub fn feature_dim(&self) -> usize {
        self.columns.x.len() + 1
    }

    /// Returns the sample at `index`.
    ///
    /// In the STNN layout the temporal coordinate pairs are joined to the
    /// spatial ones along the last axis.
    pub fn sample(&self, index: usize) -> Result<Sample> {
        if index >= self.size() {
            return Err(DatasetErr::IndexOutOfRange {
                index,
                len: self.size(),
            });
        }

        let distances = gather_distances(&self.distances, self.model_temporal(), &[index])?
            .index_axis_move(Axis(0), 0);

        Ok(Sample {
            distances,
            x: self.x_data.row(index).to_owned(),
            y: self.y_data.row(index).to_owned(),
            id: self.id_data[index],
        })
    }

    pub(crate) fn model_temporal(&self) -> Option<&Array3<f32>> {
        self.temporal.as_ref().filter(|_| self.is_need_stnn)
    }

    /// Scales the features with parameters fitted elsewhere and appends the bias column.
    ///
    /// Labels are kept in their original units, `y_params` is only recorded
    /// so [`PartitionedDataset::rescale`] can invert model outputs.
    ///
    /// # Returns
    /// An error if the dataset was already scaled, or the parameters disagree
    /// in kind or width with the columns.
    pub fn scale(&mut self, x_params: &ScaleParams, y_params: &ScaleParams) -> Result<()> {
        if self.x_scale.is_some() {
            return Err(DatasetErr::InvalidState("dataset is already scaled".into()));
        }

        if x_params.kind() != y_params.kind() {
            return Err(DatasetErr::InvalidArgument(format!(
                "feature scaling {:?} and label scaling {:?} differ",
                x_params.kind(),
                y_params.kind()
            )));
        }

        if y_params.width() != self.columns.y.len() {
            return Err(DatasetErr::SizeMismatch {
                a: "label columns",
                b: "label scaling parameters",
                got: self.columns.y.len(),
                expected: y_params.width(),
            });
        }

        let scaled = x_params.apply(self.x_data.view())?;
        self.scaled_frame = Some(self.mirror_frame(&scaled)?);

        let bias = Array2::ones((self.size(), 1));
        self.x_data = concatenate(Axis(1), &[scaled.view(), bias.view()])?;
        self.x_scale = Some(x_params.clone());
        self.y_scale = Some(y_params.clone());

        Ok(())
    }

    fn mirror_frame(&self, scaled_x: &Array2<f32>) -> Result<Table> {
        let columns = self
            .columns
            .x
            .iter()
            .chain(&self.columns.y)
            .cloned()
            .collect();
        let data = concatenate(Axis(1), &[scaled_x.view(), self.y_data.view()])?;

        Table::new(columns, data.mapv(f64::from))
    }

    /// Brings features and labels back to raw units.
    ///
    /// `x` may hold either the `p` feature columns or the `p + 1` columns of
    /// the model input, in which case the trailing bias is dropped.
    pub fn rescale(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let (Some(x_scale), Some(y_scale)) = (&self.x_scale, &self.y_scale) else {
            return Err(DatasetErr::InvalidState(
                "rescale requested before the dataset was scaled".into(),
            ));
        };

        let x = if x.ncols() == self.feature_dim() {
            x.slice_move(s![.., ..self.columns.x.len()])
        } else {
            x
        };

        Ok((x_scale.invert(x)?, y_scale.invert(y)?))
    }

    /// Attaches the reference set and the jointly scaled distances of this split.
    pub(crate) fn set_distances(
        &mut self,
        distances: Array3<f32>,
        temporal: Option<Array3<f32>>,
        reference: Arc<ReferenceSet>,
        distance_scale: ScaleParams,
    ) -> Result<()> {
        if self.reference.is_some() {
            return Err(DatasetErr::InvalidState(
                "the reference set of a dataset cannot change".into(),
            ));
        }

        if distances.len_of(Axis(0)) != self.size() {
            return Err(DatasetErr::SizeMismatch {
                a: "distance rows",
                b: "samples",
                got: distances.len_of(Axis(0)),
                expected: self.size(),
            });
        }
        check_temporal(&distances, temporal.as_ref())?;

        self.distances = distances;
        self.temporal = temporal;
        self.reference = Some(reference);
        self.distance_scale = Some(distance_scale);
        Ok(())
    }

    pub(crate) fn restore(
        &mut self,
        distances: Array3<f32>,
        temporal: Option<Array3<f32>>,
        reference: Option<ReferenceSet>,
        distance_scale: Option<ScaleParams>,
    ) -> Result<()> {
        if distances.len_of(Axis(0)) != self.size() {
            return Err(DatasetErr::SizeMismatch {
                a: "distance rows",
                b: "samples",
                got: distances.len_of(Axis(0)),
                expected: self.size(),
            });
        }
        check_temporal(&distances, temporal.as_ref())?;

        self.distances = distances;
        self.temporal = temporal;
        self.reference = reference.map(Arc::new);
        self.distance_scale = distance_scale;
        Ok(())
    }

    /// Caches the batching policy of this split.
    pub fn attach_loader(&mut self, spec: LoaderSpec) {
        self.loader = Some(spec);
    }

    /// Returns a restartable batch iterator following the attached [`LoaderSpec`], or
    /// a single unshuffled batch when none is attached.
    pub fn loader(&self) -> DataLoader<'_> {
        let spec = self.loader.unwrap_or(LoaderSpec {
            batch_size: self.size().max(1),
            shuffle: false,
            seed: 0,
        });
        DataLoader::new(self, spec)
    }

    pub fn loader_spec(&self) -> Option<LoaderSpec> {
        self.loader
    }

    pub fn frame(&self) -> &Table {
        &self.frame
    }

    pub fn scaled_frame(&self) -> Option<&Table> {
        self.scaled_frame.as_ref()
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn is_need_stnn(&self) -> bool {
        self.is_need_stnn
    }

    pub fn simple_distance(&self) -> bool {
        self.simple_distance
    }

    /// Scaled features, bias column last once scaled.
    pub fn x_data(&self) -> &Array2<f32> {
        &self.x_data
    }

    pub fn y_data(&self) -> &Array2<f32> {
        &self.y_data
    }

    pub fn ids(&self) -> &Array1<i64> {
        &self.id_data
    }

    pub fn distances(&self) -> &Array3<f32> {
        &self.distances
    }

    /// The STNN temporal coordinate pairs, kept apart from the spatial ones.
    pub fn temporal(&self) -> Option<&Array3<f32>> {
        self.temporal.as_ref()
    }

    pub fn scale_kind(&self) -> Option<ScaleKind> {
        self.x_scale.as_ref().map(ScaleParams::kind)
    }

    pub fn x_scale(&self) -> Option<&ScaleParams> {
        self.x_scale.as_ref()
    }

    pub fn y_scale(&self) -> Option<&ScaleParams> {
        self.y_scale.as_ref()
    }

    pub fn distance_scale(&self) -> Option<&ScaleParams> {
        self.distance_scale.as_ref()
    }

    pub fn reference(&self) -> Option<&ReferenceSet> {
        self.reference.as_deref()
    }

    /// Whether two datasets share the very same reference set instance.
    pub fn shares_reference(&self, other: &PartitionedDataset) -> bool {
        match (&self.reference, &other.reference) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The temporal pairs must line up with the distance tensor row for row and
/// reference for reference.
fn check_temporal(distances: &Array3<f32>, temporal: Option<&Array3<f32>>) -> Result<()> {
    let Some(temporal) = temporal else {
        return Ok(());
    };

    let (n, r, _) = distances.dim();
    let (tn, tr, _) = temporal.dim();
    if tn != n {
        return Err(DatasetErr::SizeMismatch {
            a: "temporal rows",
            b: "distance rows",
            got: tn,
            expected: n,
        });
    }
    if tr != r {
        return Err(DatasetErr::SizeMismatch {
            a: "temporal references",
            b: "distance references",
            got: tr,
            expected: r,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn columns() -> Columns {
        Columns {
            x: vec!["a".into(), "b".into()],
            y: vec!["t".into()],
            id: "id".into(),
            spatial: vec!["u".into(), "v".into()],
            temporal: None,
        }
    }

    fn dataset() -> PartitionedDataset {
        let frame = Table::new(
            ["a", "b", "t", "id", "u", "v"].map(String::from).to_vec(),
            array![
                [1., 10., 5., 7., 0., 0.],
                [3., 30., 6., 8., 1., 0.],
                [2., 20., 7., 9., 0., 1.]
            ],
        )
        .unwrap();
        PartitionedDataset::new(frame, columns(), false, true).unwrap()
    }

    fn params(ds: &PartitionedDataset) -> (ScaleParams, ScaleParams) {
        (
            ScaleParams::fit(ds.x_data().view(), ScaleKind::MinMax).unwrap(),
            ScaleParams::fit(ds.y_data().view(), ScaleKind::MinMax).unwrap(),
        )
    }

    #[test]
    fn scale_appends_bias_and_keeps_labels() {
        let mut ds = dataset();
        let (xp, yp) = params(&ds);
        ds.scale(&xp, &yp).unwrap();

        assert_eq!(ds.feature_dim(), 3);
        assert_eq!(ds.x_data().column(2), Array1::<f32>::ones(3));
        assert_eq!(ds.x_data().column(0), array![0f32, 1., 0.5]);
        assert_eq!(ds.y_data().column(0), array![5f32, 6., 7.]);
        assert_eq!(ds.scale_kind(), Some(ScaleKind::MinMax));

        let mirror = ds.scaled_frame().unwrap();
        assert_eq!(mirror.columns(), &["a", "b", "t"]);
        assert_eq!(mirror.column("t").unwrap().to_vec(), vec![5., 6., 7.]);
    }

    #[test]
    fn scaling_twice_is_refused() {
        let mut ds = dataset();
        let (xp, yp) = params(&ds);
        ds.scale(&xp, &yp).unwrap();
        assert!(matches!(ds.scale(&xp, &yp), Err(DatasetErr::InvalidState(_))));
    }

    #[test]
    fn rescale_before_scale_fails() {
        let ds = dataset();
        let res = ds.rescale(ds.x_data().view(), ds.y_data().view());
        assert!(matches!(res, Err(DatasetErr::InvalidState(_))));
    }

    #[test]
    fn rescale_drops_bias_and_inverts() {
        let mut ds = dataset();
        let (xp, yp) = params(&ds);
        ds.scale(&xp, &yp).unwrap();

        let scaled_y = yp.apply(ds.y_data().view()).unwrap();
        let (x, y) = ds.rescale(ds.x_data().view(), scaled_y.view()).unwrap();
        assert_abs_diff_eq!(x, array![[1f32, 10.], [3., 30.], [2., 20.]], epsilon = 1e-5);
        assert_abs_diff_eq!(y, array![[5f32], [6.], [7.]], epsilon = 1e-5);
    }

    #[test]
    fn sample_bounds() {
        let mut ds = dataset();
        let reference = Arc::new(ReferenceSet::new(ds.frame().slice(0..2)));
        let d = Array3::from_shape_fn((3, 2, 1), |(i, j, _)| (i * 10 + j) as f32);
        let (xp, _) = params(&ds);
        ds.set_distances(d, None, reference, xp).unwrap();

        let s = ds.sample(2).unwrap();
        assert_eq!(s.id, 9);
        assert_eq!(s.distances, array![[20f32], [21.]]);
        assert!(matches!(
            ds.sample(3),
            Err(DatasetErr::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn stnn_sample_joins_temporal() {
        let frame = dataset().frame().clone();
        let mut ds = PartitionedDataset::new(frame, columns(), true, true).unwrap();
        let reference = Arc::new(ReferenceSet::new(ds.frame().slice(0..1)));
        let d = Array3::from_elem((3, 1, 4), 1f32);
        let t = Array3::from_elem((3, 1, 2), 2f32);
        let dp = ScaleParams::fit_channels(d.view(), ScaleKind::Standard).unwrap();
        ds.set_distances(d, Some(t), reference, dp).unwrap();

        let s = ds.sample(0).unwrap();
        assert_eq!(s.distances, array![[1f32, 1., 1., 1., 2., 2.]]);
    }

    #[test]
    fn reference_is_fixed_once_set() {
        let mut ds = dataset();
        let reference = Arc::new(ReferenceSet::new(ds.frame().clone()));
        let (xp, _) = params(&ds);
        ds.set_distances(Array3::zeros((3, 3, 1)), None, reference.clone(), xp.clone())
            .unwrap();

        let res = ds.set_distances(Array3::zeros((3, 3, 1)), None, reference, xp);
        assert!(matches!(res, Err(DatasetErr::InvalidState(_))));
    }

    #[test]
    fn misaligned_temporal_pairs_are_refused() {
        let frame = dataset().frame().clone();
        let mut ds = PartitionedDataset::new(frame, columns(), true, true).unwrap();
        let reference = Arc::new(ReferenceSet::new(ds.frame().slice(0..2)));
        let d = Array3::from_elem((3, 2, 4), 1f32);
        let dp = ScaleParams::fit_channels(d.view(), ScaleKind::MinMax).unwrap();

        let res = ds.set_distances(
            d.clone(),
            Some(Array3::zeros((3, 1, 2))),
            Arc::clone(&reference),
            dp.clone(),
        );
        assert!(matches!(res, Err(DatasetErr::SizeMismatch { .. })));

        let res = ds.restore(d, Some(Array3::zeros((2, 2, 2))), None, Some(dp));
        assert!(matches!(res, Err(DatasetErr::SizeMismatch { .. })));
    }
}
