use log::warn;

use crate::{
    dataset::PartitionedDataset,
    error::{DatasetErr, Result},
    table::Table,
};

/// A trained model whose partitions and result table can be inspected.
pub trait FittedResult {
    fn train_partition(&self) -> &PartitionedDataset;
    fn valid_partition(&self) -> &PartitionedDataset;
    fn test_partition(&self) -> &PartitionedDataset;
    /// One row per observation with its coordinates and fitted values.
    fn result_table(&self) -> &Table;
}

/// Which partitions a view reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    All,
    Train,
    Valid,
    Test,
}

/// Read-only access to a fitted result for map rendering.
pub struct ResultView<'a, R: FittedResult> {
    result: &'a R,
    lon: String,
    lat: String,
    center: (f64, f64),
}

impl<'a, R: FittedResult> ResultView<'a, R> {
    /// Creates a new `ResultView`.
    ///
    /// # Arguments
    /// * `result` - The fitted model.
    /// * `lon_lat` - The longitude and latitude columns, the first two
    ///   spatial columns of the training partition when `None`.
    pub fn new(result: &'a R, lon_lat: Option<(String, String)>) -> Result<Self> {
        let (lon, lat) = match lon_lat {
            Some(cols) => cols,
            None => {
                let spatial = &result.train_partition().columns().spatial;
                let [lon, lat, ..] = spatial.as_slice() else {
                    return Err(DatasetErr::InvalidArgument(
                        "lon/lat columns not given and fewer than two spatial columns".into(),
                    ));
                };
                warn!("lon/lat columns not given, using spatial columns {lon} and {lat}");
                (lon.clone(), lat.clone())
            }
        };

        let mut view = Self {
            result,
            lon,
            lat,
            center: (0., 0.),
        };

        let all = view.select(Subset::All)?;
        view.center = (mean(&all, &view.lon)?, mean(&all, &view.lat)?);

        Ok(view)
    }

    /// The map centre, `(lon, lat)` averaged over every partition.
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn lon_lat(&self) -> (&str, &str) {
        (&self.lon, &self.lat)
    }

    /// The raw rows of the requested partitions.
    pub fn select(&self, subset: Subset) -> Result<Table> {
        let r = self.result;
        match subset {
            Subset::All => Table::concat(&[
                r.train_partition().frame(),
                r.valid_partition().frame(),
                r.test_partition().frame(),
            ]),
            Subset::Train => Ok(r.train_partition().frame().clone()),
            Subset::Valid => Ok(r.valid_partition().frame().clone()),
            Subset::Test => Ok(r.test_partition().frame().clone()),
        }
    }

    /// The `(min, max)` of `column` over a subset, the first label column when `None`.
    pub fn value_range(&self, subset: Subset, column: Option<&str>) -> Result<(f64, f64)> {
        let column = match column {
            Some(column) => column.to_string(),
            None => {
                let y = &self.result.train_partition().columns().y;
                let first = y.first().ok_or_else(|| {
                    DatasetErr::InvalidArgument("the dataset has no label column".into())
                })?;
                warn!("no column given, using label column {first}");
                first.clone()
            }
        };

        let table = self.select(subset)?;
        let range = table
            .column(&column)?
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        Ok(range)
    }

    /// `[lat, lon, value]` triples of `column` over the result table.
    pub fn heat_points(&self, column: &str) -> Result<Vec<[f64; 3]>> {
        let table = self.result.result_table();
        let lat = table.column(&self.lat)?;
        let lon = table.column(&self.lon)?;
        let values = table.column(column)?;

        Ok(lat
            .iter()
            .zip(lon.iter())
            .zip(values.iter())
            .map(|((&lat, &lon), &v)| [lat, lon, v])
            .collect())
    }
}

fn mean(table: &Table, column: &str) -> Result<f64> {
    let col = table.column(column)?;
    col.mean()
        .ok_or_else(|| DatasetErr::InvalidArgument("cannot centre a map over zero rows".into()))
}
