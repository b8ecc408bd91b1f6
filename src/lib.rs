//! Dataset preparation for geographically (and temporally) weighted neural
//! network regression: shuffling and splitting an observation table,
//! scaling its features, measuring every sample against a shared reference
//! set and handing the result out as batchable partitions.

pub mod builder;
pub mod dataset;
pub mod diagnosis;
pub mod distance;
pub mod error;
pub mod ols;
pub mod scaling;
pub mod table;
pub mod view;

pub use builder::{
    init_dataset, init_dataset_cv, init_predict_dataset, BuildConfig, BuildSpec, CrossValidation,
    Partitions, PredictConfig, PredictDataset, Reference,
};
pub use dataset::{PartitionedDataset, ReferenceSet};
pub use error::{DatasetErr, Result};
pub use table::Table;
