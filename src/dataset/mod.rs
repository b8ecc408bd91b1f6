mod loader;
mod partition;
mod persist;

use ndarray::{concatenate, Array3, Axis};

use crate::{error::Result, table::Table};

pub use loader::{Batch, DataLoader, LoaderSpec};
pub use partition::{PartitionedDataset, Sample};

/// The column roles of an observation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub id: String,
    pub spatial: Vec<String>,
    pub temporal: Option<Vec<String>>,
}

/// The observations every partition's distance rows are measured against.
///
/// Chosen once per build and shared by all partitions of that build.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    table: Table,
}

impl ReferenceSet {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[inline]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The identifiers of the reference rows, if the reference table carries `id_column`.
    pub fn ids(&self, id_column: &str) -> Option<Vec<i64>> {
        let col = self.table.column(id_column).ok()?;
        Some(col.iter().map(|&v| v as i64).collect())
    }
}

/// Picks `rows` out of a distance tensor, joining the STNN temporal pairs on the last axis.
pub(crate) fn gather_distances(
    distances: &Array3<f32>,
    temporal: Option<&Array3<f32>>,
    rows: &[usize],
) -> Result<Array3<f32>> {
    let spatial = distances.select(Axis(0), rows);
    match temporal {
        Some(temporal) => {
            let temporal = temporal.select(Axis(0), rows);
            Ok(concatenate(Axis(2), &[spatial.view(), temporal.view()])?)
        }
        None => Ok(spatial),
    }
}
