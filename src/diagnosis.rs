use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{DatasetErr, Result};

/// Goodness-of-fit statistics of a geographically weighted regression.
///
/// `weight[i, j]` is the coefficient multiplier the network produced for
/// feature `j` at sample `i`, so the hat matrix row of sample `i` is
/// `(x_i ∘ w_i) (XᵀX)⁻¹ Xᵀ`.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    n: usize,
    k: usize,
    y: DVector<f64>,
    residual: DVector<f64>,
    /// Regression sum of squares, `Σ(ŷ - ȳ)²`.
    ssr: f64,
    hat: DMatrix<f64>,
    ols_hat: DMatrix<f64>,
}

impl Diagnosis {
    /// Creates a new `Diagnosis`.
    ///
    /// # Arguments
    /// * `weight` - The n × k spatially varying weights.
    /// * `x_data` - The n × k design matrix, bias column included.
    /// * `y_data` - The n observed labels.
    /// * `y_pred` - The n predicted labels.
    ///
    /// # Returns
    /// An error if the shapes disagree or `XᵀX` is not invertible.
    pub fn new(
        weight: ArrayView2<f32>,
        x_data: ArrayView2<f32>,
        y_data: ArrayView1<f32>,
        y_pred: ArrayView1<f32>,
    ) -> Result<Self> {
        let (n, k) = x_data.dim();

        if weight.dim() != (n, k) {
            return Err(DatasetErr::SizeMismatch {
                a: "weights",
                b: "design matrix",
                got: weight.len(),
                expected: n * k,
            });
        }

        for (a, len) in [("observed labels", y_data.len()), ("predicted labels", y_pred.len())] {
            if len != n {
                return Err(DatasetErr::SizeMismatch {
                    a,
                    b: "design matrix rows",
                    got: len,
                    expected: n,
                });
            }
        }

        let x = DMatrix::from_fn(n, k, |i, j| x_data[[i, j]] as f64);
        let weighted = DMatrix::from_fn(n, k, |i, j| (x_data[[i, j]] * weight[[i, j]]) as f64);
        let y = DVector::from_iterator(n, y_data.iter().map(|&v| v as f64));
        let pred = DVector::from_iterator(n, y_pred.iter().map(|&v| v as f64));

        let xtx_inv = (x.transpose() * &x)
            .try_inverse()
            .ok_or(DatasetErr::SingularMatrix("XᵀX"))?;
        let hat_com = xtx_inv * x.transpose();

        let mean = y.mean();
        let ssr = pred.iter().map(|p| (p - mean).powi(2)).sum();

        Ok(Self {
            n,
            k,
            residual: &y - &pred,
            y,
            ssr,
            hat: weighted * &hat_com,
            ols_hat: x * hat_com,
        })
    }

    /// The n × n hat matrix.
    pub fn hat(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n, self.n), |(i, j)| self.hat[(i, j)])
    }

    /// The effective number of parameters, `tr(H)`.
    pub fn trace(&self) -> f64 {
        self.hat.trace()
    }

    fn rss(&self) -> f64 {
        self.residual.norm_squared()
    }

    /// F test of the weighted model against the global OLS fit.
    pub fn f1_test(&self) -> f64 {
        let n = self.n as f64;
        let k1 = n - 2. * self.trace() + (self.hat.transpose() * &self.hat).trace();
        let k2 = n - self.k as f64 - 1.;

        let mean = self.y.mean();
        let rss_olr: f64 = (&self.ols_hat * &self.y)
            .iter()
            .map(|fit| (mean - fit).powi(2))
            .sum();

        self.ssr / k1 / (rss_olr / k2)
    }

    pub fn aic(&self) -> f64 {
        let n = self.n as f64;
        n * (self.ssr / n * 2. * PI).ln() + n + self.k as f64
    }

    pub fn aicc(&self) -> f64 {
        let n = self.n as f64;
        let s = self.trace();
        n * ((self.ssr / n * 2. * PI).ln() + (n + s) / (n - s - 2.))
    }

    pub fn r2(&self) -> f64 {
        let mean = self.y.mean();
        let tss: f64 = self.y.iter().map(|v| (v - mean).powi(2)).sum();
        1. - self.rss() / tss
    }

    pub fn adjusted_r2(&self) -> f64 {
        let n = self.n as f64;
        1. - (1. - self.r2()) * (n - 1.) / (n - self.k as f64 - 1.)
    }

    pub fn rmse(&self) -> f64 {
        (self.rss() / self.n as f64).sqrt()
    }
}
