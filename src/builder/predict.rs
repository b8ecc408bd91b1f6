use std::ops::Range;

use log::info;
use ndarray::{concatenate, Array1, Array2, Array3, ArrayView2, Axis};

use super::assemble::{assemble, DistanceLayout, DistanceSource};
use crate::{
    dataset::{gather_distances, PartitionedDataset},
    distance::{euclidean, manhattan, DistanceFn},
    error::{DatasetErr, Result},
    scaling::ScaleParams,
    table::Table,
};

/// How new rows are prepared for inference.
#[derive(Debug, Clone, Copy)]
pub struct PredictConfig {
    /// Rows per batch, the whole table in one batch when `None`.
    pub max_size: Option<usize>,
    /// Reuse the trained feature scaling instead of fitting on the new rows.
    pub scale_sync: bool,
    pub spatial_fn: Option<DistanceFn>,
    pub temporal_fn: DistanceFn,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            scale_sync: true,
            spatial_fn: Some(euclidean),
            temporal_fn: manhattan,
        }
    }
}

/// One label-free sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictSample {
    pub distances: Array2<f32>,
    pub x: Array1<f32>,
}

/// A contiguous chunk of prediction rows.
#[derive(Debug, Clone)]
pub struct PredictBatch {
    /// Positions of these rows in the prediction table.
    pub rows: Range<usize>,
    pub distances: Array3<f32>,
    pub x: Array2<f32>,
}

/// An inference-only dataset measured against a trained reference set.
#[derive(Debug, Clone)]
pub struct PredictDataset {
    frame: Table,
    x_data: Array2<f32>,
    distances: Array3<f32>,
    temporal: Option<Array3<f32>>,
    is_need_stnn: bool,
    x_scale: ScaleParams,
    y_scale: ScaleParams,
    batch_size: usize,
}

/// Prepares `data` for inference with a model trained on `trained`.
///
/// Features are scaled with the trained parameters (or refitted when
/// `config.scale_sync` is off), distances are measured against the trained
/// reference set with the trained layout and scaled with the trained
/// distance parameters, never refitted.
///
/// # Returns
/// An error if no spatial function is given, or `trained` lacks scaling
/// parameters or a reference set.
pub fn init_predict_dataset(
    data: &Table,
    trained: &PartitionedDataset,
    config: &PredictConfig,
) -> Result<PredictDataset> {
    let spatial_fn = config.spatial_fn.ok_or_else(|| {
        DatasetErr::InvalidArgument("a spatial distance function is required".into())
    })?;

    let columns = trained.columns();
    if columns.spatial.is_empty() {
        return Err(DatasetErr::InvalidArgument(
            "the trained dataset records no spatial columns".into(),
        ));
    }

    let (Some(x_scale), Some(y_scale)) = (trained.x_scale(), trained.y_scale()) else {
        return Err(DatasetErr::InvalidState(
            "the trained dataset has no min-max or standard scaling".into(),
        ));
    };
    let Some(reference) = trained.reference() else {
        return Err(DatasetErr::InvalidState(
            "the trained dataset has no reference set".into(),
        ));
    };
    let Some(distance_scale) = trained.distance_scale() else {
        return Err(DatasetErr::InvalidState(
            "the trained dataset has no distance scaling".into(),
        ));
    };

    let raw_x = data.select(&columns.x)?;
    let x_scale = if config.scale_sync {
        x_scale.clone()
    } else {
        ScaleParams::fit(raw_x.view(), x_scale.kind())?
    };

    let scaled = x_scale.apply(raw_x.view())?;
    let bias = Array2::ones((data.len(), 1));
    let x_data = concatenate(Axis(1), &[scaled.view(), bias.view()])?;

    let layout = DistanceLayout::new(trained.is_need_stnn(), trained.simple_distance());
    let source = DistanceSource {
        spatial_columns: &columns.spatial,
        temporal_columns: columns.temporal.as_deref(),
        spatial_fn,
        temporal_fn: config.temporal_fn,
    };
    let assembled = assemble(data, reference.table(), layout, source)?;
    let distances = distance_scale.apply_channels(assembled.distances.view())?;

    info!(
        "prediction set: {} rows against {} reference rows, distances {:?}",
        data.len(),
        reference.len(),
        distances.dim()
    );

    Ok(PredictDataset {
        frame: data.clone(),
        x_data,
        distances,
        temporal: assembled.temporal,
        is_need_stnn: trained.is_need_stnn(),
        x_scale,
        y_scale: y_scale.clone(),
        batch_size: config.max_size.unwrap_or(data.len()).max(1),
    })
}

impl PredictDataset {
    #[inline]
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// The number of model coefficients: one per feature plus the bias.
    #[inline]
    pub fn feature_dim(&self) -> usize {
        self.x_data.ncols()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sample(&self, index: usize) -> Result<PredictSample> {
        if index >= self.len() {
            return Err(DatasetErr::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let distances = gather_distances(&self.distances, self.model_temporal(), &[index])?
            .index_axis_move(Axis(0), 0);

        Ok(PredictSample {
            distances,
            x: self.x_data.row(index).to_owned(),
        })
    }

    /// Yields consecutive chunks of at most `batch_size` rows, in table order.
    pub fn batches(&self) -> impl Iterator<Item = Result<PredictBatch>> + '_ {
        let n = self.len();
        (0..n).step_by(self.batch_size).map(move |start| {
            let end = (start + self.batch_size).min(n);
            let rows: Vec<usize> = (start..end).collect();

            Ok(PredictBatch {
                rows: start..end,
                distances: gather_distances(&self.distances, self.model_temporal(), &rows)?,
                x: self.x_data.select(Axis(0), &rows),
            })
        })
    }

    /// Brings model outputs back to label units with the trained label parameters.
    pub fn rescale(&self, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.y_scale.invert(y)
    }

    fn model_temporal(&self) -> Option<&Array3<f32>> {
        self.temporal.as_ref().filter(|_| self.is_need_stnn)
    }

    pub fn frame(&self) -> &Table {
        &self.frame
    }

    /// Scaled features, bias column last.
    pub fn x_data(&self) -> &Array2<f32> {
        &self.x_data
    }

    pub fn distances(&self) -> &Array3<f32> {
        &self.distances
    }

    pub fn temporal(&self) -> Option<&Array3<f32>> {
        self.temporal.as_ref()
    }

    pub fn x_scale(&self) -> &ScaleParams {
        &self.x_scale
    }
}
