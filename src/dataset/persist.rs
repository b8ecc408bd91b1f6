use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use log::{info, warn};
use ndarray::{Array3, Axis};
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};

use super::{Columns, PartitionedDataset, ReferenceSet};
use crate::{
    error::{DatasetErr, Result},
    scaling::{ScaleKind, ScaleParams},
    table::Table,
};

const INFO_FILE: &str = "dataset_info.json";
const DISTANCES_FILE: &str = "distances.npy";
const TEMPORAL_FILE: &str = "temporal.npy";
const FRAME_FILE: &str = "dataframe.csv";
const SCALED_FRAME_FILE: &str = "scaledDataframe.csv";
const REFERENCE_FILE: &str = "reference.csv";

/// The self-describing metadata of a persisted dataset.
#[derive(Debug, Serialize, Deserialize)]
struct DatasetInfo {
    x: Vec<String>,
    y: Vec<String>,
    id: Vec<String>,
    #[serde(rename = "is_need_STNN")]
    is_need_stnn: bool,
    scale_fn: ScaleKind,
    x_scale_info: ScaleParams,
    y_scale_info: ScaleParams,
    distance_scale_info: Option<ScaleParams>,
    #[serde(default)]
    spatial_column: Vec<String>,
    #[serde(default)]
    temp_column: Option<Vec<String>>,
    #[serde(default = "default_simple_distance")]
    simple_distance: bool,
}

fn default_simple_distance() -> bool {
    true
}

impl PartitionedDataset {
    /// Writes this dataset as a bundle of files into a new directory.
    ///
    /// When a write fails the directory is removed again, so a retry starts
    /// from scratch.
    ///
    /// # Returns
    /// An error if `dir` already exists or the dataset was never scaled.
    pub fn persist<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if dir.exists() {
            return Err(DatasetErr::AlreadyExists(dir.to_path_buf()));
        }

        let (Some(x_scale), Some(y_scale), Some(scaled_frame)) =
            (self.x_scale(), self.y_scale(), self.scaled_frame())
        else {
            return Err(DatasetErr::InvalidState(
                "only scaled datasets can be persisted".into(),
            ));
        };

        fs::create_dir_all(dir)?;

        discard_on_err(dir, self.write_bundle(dir, x_scale, y_scale, scaled_frame))?;

        info!("persisted {} samples into {}", self.size(), dir.display());
        Ok(())
    }

    fn write_bundle(
        &self,
        dir: &Path,
        x_scale: &ScaleParams,
        y_scale: &ScaleParams,
        scaled_frame: &Table,
    ) -> Result<()> {
        let columns = self.columns();
        let info = DatasetInfo {
            x: columns.x.clone(),
            y: columns.y.clone(),
            id: vec![columns.id.clone()],
            is_need_stnn: self.is_need_stnn(),
            scale_fn: x_scale.kind(),
            x_scale_info: x_scale.clone(),
            y_scale_info: y_scale.clone(),
            distance_scale_info: self.distance_scale().cloned(),
            spatial_column: columns.spatial.clone(),
            temp_column: columns.temporal.clone(),
            simple_distance: self.simple_distance(),
        };

        let writer = BufWriter::new(File::create(dir.join(INFO_FILE))?);
        serde_json::to_writer_pretty(writer, &info)?;

        write_npy(dir.join(DISTANCES_FILE), self.distances())?;
        if let Some(temporal) = self.temporal() {
            write_npy(dir.join(TEMPORAL_FILE), temporal)?;
        }

        self.frame().to_csv(dir.join(FRAME_FILE))?;
        scaled_frame.to_csv(dir.join(SCALED_FRAME_FILE))?;
        if let Some(reference) = self.reference() {
            reference.table().to_csv(dir.join(REFERENCE_FILE))?;
        }

        Ok(())
    }

    /// Reads a bundle written by [`PartitionedDataset::persist`].
    ///
    /// Features are rebuilt from the raw table with the stored scaling
    /// parameters, the distance tensor is read back as stored.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DatasetErr::NotFound(dir.to_path_buf()));
        }

        let reader = BufReader::new(File::open(dir.join(INFO_FILE))?);
        let info: DatasetInfo = serde_json::from_reader(reader)?;

        if info.x_scale_info.kind() != info.scale_fn {
            return Err(DatasetErr::InvalidState(format!(
                "scale_fn {:?} doesn't match the stored feature parameters",
                info.scale_fn
            )));
        }

        let [id] = <[String; 1]>::try_from(info.id).map_err(|ids| {
            DatasetErr::InvalidArgument(format!("expected a single id column, got {ids:?}"))
        })?;

        let columns = Columns {
            x: info.x,
            y: info.y,
            id,
            spatial: info.spatial_column,
            temporal: info.temp_column,
        };

        let frame = Table::from_csv(dir.join(FRAME_FILE))?;
        let mut dataset =
            PartitionedDataset::new(frame, columns, info.is_need_stnn, info.simple_distance)?;
        dataset.scale(&info.x_scale_info, &info.y_scale_info)?;

        let distances: Array3<f32> = read_npy(dir.join(DISTANCES_FILE))?;
        if distances.len_of(Axis(0)) != dataset.size() {
            return Err(DatasetErr::SizeMismatch {
                a: "distance rows",
                b: "samples",
                got: distances.len_of(Axis(0)),
                expected: dataset.size(),
            });
        }

        let temporal_path = dir.join(TEMPORAL_FILE);
        let temporal = if temporal_path.exists() {
            Some(read_npy::<_, Array3<f32>>(temporal_path)?)
        } else {
            None
        };

        let reference_path = dir.join(REFERENCE_FILE);
        let reference = if reference_path.exists() {
            Some(ReferenceSet::new(Table::from_csv(reference_path)?))
        } else {
            None
        };

        dataset.restore(distances, temporal, reference, info.distance_scale_info)?;
        Ok(dataset)
    }
}

/// Removes a partially written bundle directory when `res` is an error.
fn discard_on_err<T>(dir: &Path, res: Result<T>) -> Result<T> {
    if res.is_err() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!("couldn't remove {}: {e}", dir.display());
        }
    }
    res
}
