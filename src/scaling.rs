use log::warn;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{DatasetErr, Result};

/// The affine transform applied to features, labels and distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    /// `(x - min) / (max - min)`
    #[serde(rename = "minmax_scale")]
    MinMax,
    /// `(x - mean) / sqrt(var)`
    #[serde(rename = "standard_scale")]
    Standard,
}

/// Per column parameters of a fitted [`ScaleKind`].
///
/// Stored as `f64` and persisted as plain numeric arrays, the scaled values
/// themselves are `f32`. Standard scaling keeps the population variance, the
/// square root is taken where it is used.
///
/// A column with zero range (min-max) or zero variance (standard) makes
/// [`ScaleParams::apply`] divide by zero, the result is `inf`/`NaN` for that
/// column. Callers must drop constant columns before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleParams {
    MinMax { min: Vec<f64>, max: Vec<f64> },
    Standard { mean: Vec<f64>, var: Vec<f64> },
}

impl ScaleParams {
    /// Fits the parameters of `kind` over each column of `x`.
    ///
    /// # Returns
    /// An error if `x` has no rows.
    pub fn fit(x: ArrayView2<f32>, kind: ScaleKind) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(DatasetErr::InvalidArgument(
                "cannot fit scaling parameters over zero rows".into(),
            ));
        }

        let params = match kind {
            ScaleKind::MinMax => {
                let (min, max): (Vec<f64>, Vec<f64>) = x
                    .axis_iter(Axis(1))
                    .map(|col| {
                        col.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                            (lo.min(v as f64), hi.max(v as f64))
                        })
                    })
                    .unzip();

                ScaleParams::MinMax { min, max }
            }
            ScaleKind::Standard => {
                let n = x.nrows() as f64;
                let (mean, var): (Vec<f64>, Vec<f64>) = x
                    .axis_iter(Axis(1))
                    .map(|col| {
                        let mean = col.iter().map(|&v| v as f64).sum::<f64>() / n;
                        let var = col
                            .iter()
                            .map(|&v| (v as f64 - mean).powi(2))
                            .sum::<f64>()
                            / n;
                        (mean, var)
                    })
                    .unzip();

                ScaleParams::Standard { mean, var }
            }
        };

        let degenerate = params.degenerate_columns();
        if !degenerate.is_empty() {
            warn!("columns {degenerate:?} are constant, scaling them divides by zero");
        }

        Ok(params)
    }

    pub fn kind(&self) -> ScaleKind {
        match self {
            ScaleParams::MinMax { .. } => ScaleKind::MinMax,
            ScaleParams::Standard { .. } => ScaleKind::Standard,
        }
    }

    /// The number of columns these parameters were fitted on.
    pub fn width(&self) -> usize {
        match self {
            ScaleParams::MinMax { min, .. } => min.len(),
            ScaleParams::Standard { mean, .. } => mean.len(),
        }
    }

    fn degenerate_columns(&self) -> Vec<usize> {
        let (offset, span) = self.affine();
        (0..offset.len()).filter(|&j| span[j] == 0.).collect()
    }

    /// Returns `(offset, span)` so that `apply(x) = (x - offset) / span`.
    fn affine(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            ScaleParams::MinMax { min, max } => {
                let span = min.iter().zip(max).map(|(lo, hi)| hi - lo).collect();
                (min.clone(), span)
            }
            ScaleParams::Standard { mean, var } => {
                (mean.clone(), var.iter().map(|v| v.sqrt()).collect())
            }
        }
    }

    fn check_width(&self, got: usize) -> Result<()> {
        if got != self.width() {
            return Err(DatasetErr::SizeMismatch {
                a: "matrix columns",
                b: "scaling parameters",
                got,
                expected: self.width(),
            });
        }
        Ok(())
    }

    /// Scales every column of `x`.
    pub fn apply(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_width(x.ncols())?;
        let (offset, span) = self.affine();

        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| ((v as f64 - offset[j]) / span[j]) as f32);
        }

        Ok(out)
    }

    /// Brings scaled values back to their original units, the inverse of [`ScaleParams::apply`].
    pub fn invert(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_width(x.ncols())?;
        let (offset, span) = self.affine();

        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v as f64 * span[j] + offset[j]) as f32);
        }

        Ok(out)
    }

    /// Fits one parameter per channel (last axis) over every `(sample, reference)` pair.
    pub fn fit_channels(d: ArrayView3<f32>, kind: ScaleKind) -> Result<Self> {
        let flat = flatten_channels(d)?;
        Self::fit(flat.view(), kind)
    }

    /// Scales each channel (last axis) of a distance tensor.
    pub fn apply_channels(&self, d: ArrayView3<f32>) -> Result<Array3<f32>> {
        let flat = flatten_channels(d)?;
        let scaled = self.apply(flat.view())?;
        Ok(scaled.into_shape_with_order(d.dim())?)
    }
}

fn flatten_channels(d: ArrayView3<f32>) -> Result<Array2<f32>> {
    let (n, r, c) = d.dim();
    let flat = d.as_standard_layout().into_owned();
    Ok(flat.into_shape_with_order((n * r, c))?)
}
