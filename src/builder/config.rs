use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    distance::{euclidean, manhattan, DistanceFn, Metric},
    error::{DatasetErr, Result},
    scaling::ScaleKind,
    table::Table,
};

/// Which observations the distance rows of every partition are measured against.
#[derive(Debug, Clone, Default)]
pub enum Reference {
    /// The training rows only.
    #[default]
    Train,
    /// The training and validation rows.
    TrainVal,
    /// An explicit table, it must carry the spatial (and temporal) columns.
    Table(Table),
}

impl Reference {
    /// Parses the `"train"` / `"train_val"` selectors.
    pub fn from_selector(selector: &str) -> Result<Self> {
        match selector {
            "train" => Ok(Reference::Train),
            "train_val" => Ok(Reference::TrainVal),
            other => Err(DatasetErr::InvalidArgument(format!(
                "reference selector must be 'train' or 'train_val', got '{other}'"
            ))),
        }
    }
}

/// The configuration of a dataset build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub x_columns: Vec<String>,
    pub y_columns: Vec<String>,
    pub spatial_columns: Option<Vec<String>>,
    pub temporal_columns: Option<Vec<String>>,
    /// When absent an `id` column holding each row's original position is added.
    pub id_column: Option<String>,

    pub test_ratio: f64,
    pub valid_ratio: f64,
    /// Index of the validation window, slid for k-fold cross validation.
    pub fold: usize,
    pub seed: u64,
    pub scale_kind: ScaleKind,

    pub batch_size: usize,
    pub shuffle: bool,
    /// Whether validation and test batches are shuffled too.
    pub shuffle_eval: bool,
    pub max_val_size: Option<usize>,
    pub max_test_size: Option<usize>,

    pub is_need_stnn: bool,
    pub reference: Reference,
    pub simple_distance: bool,
    pub spatial_fn: Option<DistanceFn>,
    pub temporal_fn: DistanceFn,
}

impl BuildConfig {
    /// Creates a new `BuildConfig` with the default policies.
    ///
    /// Defaults: 20% test, 10% validation, seed 100, min-max scaling, batch
    /// size 32 with shuffling, training rows as reference, simple Euclidean
    /// spatial and Manhattan temporal distances.
    ///
    /// # Arguments
    /// * `x_columns` - The independent variables.
    /// * `y_columns` - The dependent variables.
    /// * `spatial_columns` - The coordinates distances are computed over.
    pub fn new(
        x_columns: Vec<String>,
        y_columns: Vec<String>,
        spatial_columns: Vec<String>,
    ) -> Self {
        Self {
            x_columns,
            y_columns,
            spatial_columns: Some(spatial_columns),
            temporal_columns: None,
            id_column: None,
            test_ratio: 0.2,
            valid_ratio: 0.1,
            fold: 0,
            seed: 100,
            scale_kind: ScaleKind::MinMax,
            batch_size: 32,
            shuffle: true,
            shuffle_eval: false,
            max_val_size: None,
            max_test_size: None,
            is_need_stnn: false,
            reference: Reference::Train,
            simple_distance: true,
            spatial_fn: Some(euclidean),
            temporal_fn: manhattan,
        }
    }

    pub fn with_ratios(mut self, test_ratio: f64, valid_ratio: f64) -> Self {
        self.test_ratio = test_ratio;
        self.valid_ratio = valid_ratio;
        self
    }

    pub fn with_temporal(mut self, temporal_columns: Vec<String>) -> Self {
        self.temporal_columns = Some(temporal_columns);
        self
    }

    pub fn with_id(mut self, id_column: &str) -> Self {
        self.id_column = Some(id_column.to_string());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scale(mut self, scale_kind: ScaleKind) -> Self {
        self.scale_kind = scale_kind;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_simple_distance(mut self, simple_distance: bool) -> Self {
        self.simple_distance = simple_distance;
        self
    }

    pub fn with_stnn(mut self, is_need_stnn: bool) -> Self {
        self.is_need_stnn = is_need_stnn;
        self
    }

    pub fn with_fold(mut self, fold: usize) -> Self {
        self.fold = fold;
        self
    }

    pub fn with_batching(mut self, batch_size: usize, shuffle: bool) -> Self {
        self.batch_size = batch_size;
        self.shuffle = shuffle;
        self
    }

    pub fn with_eval_caps(
        mut self,
        max_val_size: Option<usize>,
        max_test_size: Option<usize>,
    ) -> Self {
        self.max_val_size = max_val_size;
        self.max_test_size = max_test_size;
        self
    }
}

/// The JSON form of a [`BuildConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSpec {
    pub x_column: Vec<String>,
    pub y_column: Vec<String>,
    pub spatial_column: Option<Vec<String>>,
    #[serde(default)]
    pub temp_column: Option<Vec<String>>,
    #[serde(default)]
    pub id_column: Option<String>,

    pub test_ratio: f64,
    pub valid_ratio: f64,
    #[serde(default)]
    pub from_for_cv: usize,
    #[serde(default = "default_seed")]
    pub sample_seed: u64,
    #[serde(default = "default_scale")]
    pub process_fn: ScaleKind,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default)]
    pub shuffle_eval: bool,
    #[serde(default)]
    pub max_val_size: Option<usize>,
    #[serde(default)]
    pub max_test_size: Option<usize>,

    #[serde(default, rename = "is_need_STNN")]
    pub is_need_stnn: bool,
    /// `"train"` or `"train_val"`, ignored when `reference_csv` is given.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reference_csv: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub simple_distance: bool,
    #[serde(default = "default_spatial_fun")]
    pub spatial_fun: Option<Metric>,
    #[serde(default = "default_temporal_fun")]
    pub temporal_fun: Metric,
}

fn default_seed() -> u64 {
    100
}

fn default_scale() -> ScaleKind {
    ScaleKind::MinMax
}

fn default_batch_size() -> usize {
    32
}

fn default_true() -> bool {
    true
}

fn default_spatial_fun() -> Option<Metric> {
    Some(Metric::Euclidean)
}

fn default_temporal_fun() -> Metric {
    Metric::Manhattan
}

impl TryFrom<BuildSpec> for BuildConfig {
    type Error = DatasetErr;

    fn try_from(spec: BuildSpec) -> Result<Self> {
        let reference = match (&spec.reference_csv, &spec.reference) {
            (Some(path), _) => Reference::Table(Table::from_csv(path)?),
            (None, Some(selector)) => Reference::from_selector(selector)?,
            (None, None) => Reference::Train,
        };

        Ok(Self {
            x_columns: spec.x_column,
            y_columns: spec.y_column,
            spatial_columns: spec.spatial_column,
            temporal_columns: spec.temp_column,
            id_column: spec.id_column,
            test_ratio: spec.test_ratio,
            valid_ratio: spec.valid_ratio,
            fold: spec.from_for_cv,
            seed: spec.sample_seed,
            scale_kind: spec.process_fn,
            batch_size: spec.batch_size,
            shuffle: spec.shuffle,
            shuffle_eval: spec.shuffle_eval,
            max_val_size: spec.max_val_size,
            max_test_size: spec.max_test_size,
            is_need_stnn: spec.is_need_stnn,
            reference,
            simple_distance: spec.simple_distance,
            spatial_fn: spec.spatial_fun.map(Metric::as_fn),
            temporal_fn: spec.temporal_fun.as_fn(),
        })
    }
}
