use std::{collections::HashSet, ops::Range, path::Path};

use csv::{ReaderBuilder, Writer};
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{DatasetErr, Result};

/// A table of observations: named numeric columns, one row per sample.
///
/// Values are kept as `f64` so identifiers and coordinates survive untouched,
/// the tensors handed to the model are produced as `f32` by [`Table::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl Table {
    /// Creates a new `Table`.
    ///
    /// # Arguments
    /// * `columns` - The column names, unique.
    /// * `data` - A rows × columns matrix.
    ///
    /// # Returns
    /// An error if the column count doesn't match the data or a name is repeated.
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(DatasetErr::SizeMismatch {
                a: "columns",
                b: "data",
                got: columns.len(),
                expected: data.ncols(),
            });
        }

        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(DatasetErr::InvalidArgument(format!(
                "column '{dup}' appears more than once"
            )));
        }

        Ok(Self { columns, data })
    }

    /// Reads a table from a CSV file whose first row holds the column names.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut values = Vec::new();
        let mut rows = 0;

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (field, column) in record.iter().zip(&columns) {
                let value = field.trim().parse::<f64>().map_err(|e| {
                    DatasetErr::InvalidArgument(format!(
                        "{}: row {row}, column '{column}': {e}",
                        path.display()
                    ))
                })?;
                values.push(value);
            }
            rows += 1;
        }

        let data = Array2::from_shape_vec((rows, columns.len()), values)?;
        Self::new(columns, data)
    }

    /// Writes the table as CSV, header row first.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(&self.columns)?;

        for row in self.data.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }

        writer.flush()?;
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DatasetErr::InvalidArgument(format!("'{name}' is not a column")))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.position(name)?;
        Ok(self.data.column(idx))
    }

    /// Gathers the given columns, in order, as an `f32` matrix.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f32>> {
        let idx = names
            .iter()
            .map(|n| self.position(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.data.select(Axis(1), &idx).mapv(|v| v as f32))
    }

    /// Returns a new table holding the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            data: self.data.select(Axis(0), rows),
        }
    }

    /// Returns a new table holding a contiguous range of rows.
    pub fn slice(&self, rows: Range<usize>) -> Table {
        Table {
            columns: self.columns.clone(),
            data: self.data.slice(s![rows, ..]).to_owned(),
        }
    }

    /// Stacks tables vertically, all of them must share the same columns.
    pub fn concat(tables: &[&Table]) -> Result<Table> {
        let Some(first) = tables.first() else {
            return Err(DatasetErr::InvalidArgument(
                "cannot concatenate an empty list of tables".into(),
            ));
        };

        if let Some(other) = tables.iter().find(|t| t.columns != first.columns) {
            return Err(DatasetErr::InvalidArgument(format!(
                "column mismatch while concatenating: {:?} vs {:?}",
                first.columns, other.columns
            )));
        }

        let views: Vec<_> = tables.iter().map(|t| t.data.view()).collect();
        Ok(Table {
            columns: first.columns.clone(),
            data: concatenate(Axis(0), &views)?,
        })
    }

    /// Appends a new column at the end.
    pub fn with_column(self, name: &str, values: Array1<f64>) -> Result<Table> {
        if self.has_column(name) {
            return Err(DatasetErr::NameConflict {
                column: name.to_string(),
            });
        }

        if values.len() != self.len() {
            return Err(DatasetErr::SizeMismatch {
                a: "new column",
                b: "table rows",
                got: values.len(),
                expected: self.len(),
            });
        }

        let Table { mut columns, data } = self;
        columns.push(name.to_string());
        let data = concatenate(Axis(1), &[data.view(), values.view().insert_axis(Axis(1))])?;

        Ok(Table { columns, data })
    }
}
