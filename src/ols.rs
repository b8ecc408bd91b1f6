use nalgebra::{DMatrix, DVector};
use ndarray::Array1;

use crate::{
    error::{DatasetErr, Result},
    table::Table,
};

/// Singular values below this are treated as zero when ranking the design matrix.
const RANK_EPS: f64 = 1e-10;

/// An ordinary least squares fit with intercept, the linear baseline the
/// network's output layer is initialised from.
#[derive(Debug, Clone)]
pub struct Ols {
    x_columns: Vec<String>,
    params: Vec<f64>,
}

impl Ols {
    /// Fits `y_column ~ x_columns + 1` over every row of `table`.
    ///
    /// # Returns
    /// An error if a column is missing or the design matrix is rank deficient.
    pub fn fit<S: AsRef<str>>(table: &Table, x_columns: &[S], y_column: &str) -> Result<Self> {
        let x = table.data();
        let n = table.len();
        let k = x_columns.len();

        let idx = x_columns
            .iter()
            .map(|c| {
                let name = c.as_ref();
                table
                    .columns()
                    .iter()
                    .position(|col| col == name)
                    .ok_or_else(|| DatasetErr::InvalidArgument(format!("'{name}' is not a column")))
            })
            .collect::<Result<Vec<_>>>()?;

        // intercept in the last column so the solution is already in output order
        let design = DMatrix::from_fn(n, k + 1, |i, j| if j < k { x[[i, idx[j]]] } else { 1. });
        let y = DVector::from_iterator(n, table.column(y_column)?.iter().copied());

        let svd = design.svd(true, true);
        if svd.rank(RANK_EPS) < k + 1 {
            return Err(DatasetErr::SingularMatrix("the OLS design matrix"));
        }

        let params = svd.solve(&y, RANK_EPS).map_err(DatasetErr::SingularMatrix)?;

        Ok(Self {
            x_columns: x_columns.iter().map(|c| c.as_ref().to_string()).collect(),
            params: params.iter().copied().collect(),
        })
    }

    /// Per-feature coefficients, in column order, followed by the intercept.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn intercept(&self) -> f64 {
        self.params[self.params.len() - 1]
    }

    /// Evaluates the fitted plane on the rows of `table`.
    pub fn predict(&self, table: &Table) -> Result<Array1<f64>> {
        let mut out = Array1::from_elem(table.len(), self.intercept());
        for (name, coef) in self.x_columns.iter().zip(&self.params) {
            out.scaled_add(*coef, &table.column(name)?);
        }

        Ok(out)
    }
}
