mod assemble;
mod config;
mod predict;
mod split;

use std::sync::Arc;

use log::info;
use ndarray::Array1;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;

use crate::{
    dataset::{Columns, LoaderSpec, PartitionedDataset, ReferenceSet},
    distance::DistanceFn,
    error::{DatasetErr, Result},
    scaling::ScaleParams,
    table::Table,
};
use assemble::{assemble, stack, unstack, DistanceSource};
use split::split_plan;

pub use assemble::DistanceLayout;
pub use config::{BuildConfig, BuildSpec, Reference};
pub use predict::{
    init_predict_dataset, PredictBatch, PredictConfig, PredictDataset, PredictSample,
};

/// The name of the identifier column added when the caller doesn't declare one.
pub const SYNTHETIC_ID: &str = "id";

/// The three partitions of one build, sharing reference set and distance scaling.
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train: PartitionedDataset,
    pub valid: PartitionedDataset,
    pub test: PartitionedDataset,
}

/// The `(train, validation)` pairs of a k-fold build and their common test split.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    pub folds: Vec<(PartitionedDataset, PartitionedDataset)>,
    pub test: PartitionedDataset,
}

/// Builds the train, validation and test partitions of `data`.
///
/// # Arguments
/// * `data` - The raw observations.
/// * `config` - The build configuration, `config.fold` selects the validation window.
///
/// # Returns
/// An error if the configuration is invalid, in which case no partition is built.
pub fn init_dataset(data: &Table, config: &BuildConfig) -> Result<Partitions> {
    DatasetBuilder::prepare(data, config)?.build(config.valid_ratio, config.fold)
}

/// Builds `k_fold` `(train, validation)` pairs by sliding the validation window
/// over the non-test rows, each window `(1 - test_ratio) / k_fold` wide.
///
/// The test split is the one built alongside the first fold.
pub fn init_dataset_cv(
    data: &Table,
    config: &BuildConfig,
    k_fold: usize,
) -> Result<CrossValidation> {
    if k_fold == 0 {
        return Err(DatasetErr::InvalidArgument("k_fold must be at least 1".into()));
    }

    let builder = DatasetBuilder::prepare(data, config)?;
    let valid_ratio = (1. - config.test_ratio) / k_fold as f64;

    let first = builder.build(valid_ratio, 0)?;
    let mut folds = Vec::with_capacity(k_fold);
    folds.push((first.train, first.valid));

    for fold in 1..k_fold {
        let Partitions { train, valid, .. } = builder.build(valid_ratio, fold)?;
        folds.push((train, valid));
    }

    Ok(CrossValidation {
        folds,
        test: first.test,
    })
}

/// Holds the shuffled table and the scaling fitted on all of it, then cuts
/// partitions out of it one fold at a time.
pub struct DatasetBuilder<'a> {
    config: &'a BuildConfig,
    table: Table,
    columns: Columns,
    spatial_fn: DistanceFn,
    x_scale: ScaleParams,
    y_scale: ScaleParams,
}

impl<'a> DatasetBuilder<'a> {
    /// Validates the configuration, adds the synthetic id when needed,
    /// shuffles and fits feature and label scaling over the whole table.
    pub fn prepare(data: &Table, config: &'a BuildConfig) -> Result<Self> {
        let spatial_fn = config.spatial_fn.ok_or_else(|| {
            DatasetErr::InvalidArgument("a spatial distance function is required".into())
        })?;

        let spatial = config
            .spatial_columns
            .clone()
            .filter(|cols| !cols.is_empty())
            .ok_or_else(|| DatasetErr::InvalidArgument("spatial columns are required".into()))?;

        if config.x_columns.is_empty() || config.y_columns.is_empty() {
            return Err(DatasetErr::InvalidArgument(
                "at least one feature and one label column are required".into(),
            ));
        }

        if data.is_empty() {
            return Err(DatasetErr::InvalidArgument("the table has no rows".into()));
        }

        let (data, id) = match &config.id_column {
            Some(id) if data.has_column(id) => (data.clone(), id.clone()),
            Some(id) => {
                return Err(DatasetErr::InvalidArgument(format!("'{id}' is not a column")));
            }
            None if data.has_column(SYNTHETIC_ID) => {
                return Err(DatasetErr::NameConflict {
                    column: SYNTHETIC_ID.to_string(),
                });
            }
            None => {
                let positions = Array1::from_iter((0..data.len()).map(|i| i as f64));
                (data.clone().with_column(SYNTHETIC_ID, positions)?, SYNTHETIC_ID.to_string())
            }
        };

        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(config.seed);
        order.shuffle(&mut rng);
        let table = data.take(&order);

        table.select(&spatial)?;
        if let Some(temporal) = &config.temporal_columns {
            table.select(temporal)?;
        }

        let x_scale = ScaleParams::fit(table.select(&config.x_columns)?.view(), config.scale_kind)?;
        let y_scale = ScaleParams::fit(table.select(&config.y_columns)?.view(), config.scale_kind)?;
        info!("x scaling: {x_scale:?}");
        info!("y scaling: {y_scale:?}");

        let columns = Columns {
            x: config.x_columns.clone(),
            y: config.y_columns.clone(),
            id,
            spatial,
            temporal: config.temporal_columns.clone(),
        };

        Ok(Self {
            config,
            table,
            columns,
            spatial_fn,
            x_scale,
            y_scale,
        })
    }

    /// The full table after shuffling, synthetic id included.
    pub fn shuffled(&self) -> &Table {
        &self.table
    }

    /// Cuts the partitions of one validation window.
    pub fn build(&self, valid_ratio: f64, fold: usize) -> Result<Partitions> {
        let config = self.config;
        let plan = split_plan(self.table.len(), config.test_ratio, valid_ratio, fold)?;

        let train = self.table.take(&plan.train);
        let valid = self.table.slice(plan.valid);
        let test = self.table.slice(plan.test);

        let reference = Arc::new(self.resolve_reference(&train, &valid)?);
        if reference.is_empty() {
            return Err(DatasetErr::InvalidArgument("the reference set is empty".into()));
        }

        info!(
            "fold {fold}: train {}, valid {}, test {}, reference {}",
            train.len(),
            valid.len(),
            test.len(),
            reference.len()
        );

        let mut parts = [train, valid, test]
            .into_iter()
            .map(|frame| {
                let mut part = PartitionedDataset::new(
                    frame,
                    self.columns.clone(),
                    config.is_need_stnn,
                    config.simple_distance,
                )?;
                part.scale(&self.x_scale, &self.y_scale)?;
                Ok(part)
            })
            .collect::<Result<Vec<_>>>()?;

        let layout = DistanceLayout::new(config.is_need_stnn, config.simple_distance);
        let source = DistanceSource {
            spatial_columns: &self.columns.spatial,
            temporal_columns: self.columns.temporal.as_deref(),
            spatial_fn: self.spatial_fn,
            temporal_fn: config.temporal_fn,
        };

        let assembled = parts
            .par_iter()
            .map(|part| assemble(part.frame(), reference.table(), layout, source))
            .collect::<Result<Vec<_>>>()?;

        let lens: Vec<usize> = parts.iter().map(PartitionedDataset::size).collect();
        let raw: Vec<_> = assembled.iter().map(|a| &a.distances).collect();
        let stacked = stack(&raw)?;

        let distance_scale = ScaleParams::fit_channels(stacked.view(), config.scale_kind)?;
        let scaled = distance_scale.apply_channels(stacked.view())?;
        info!("distance scaling: {distance_scale:?}");

        let blocks = unstack(scaled, &lens);
        for ((part, distances), assembled) in parts.iter_mut().zip(blocks).zip(assembled) {
            part.set_distances(
                distances,
                assembled.temporal,
                Arc::clone(&reference),
                distance_scale.clone(),
            )?;
        }

        let [mut train, mut valid, mut test] = <[PartitionedDataset; 3]>::try_from(parts)
            .map_err(|_| DatasetErr::InvalidState("expected exactly three partitions".into()))?;

        train.attach_loader(LoaderSpec {
            batch_size: config.batch_size,
            shuffle: config.shuffle,
            seed: config.seed,
        });
        valid.attach_loader(LoaderSpec {
            batch_size: config.max_val_size.unwrap_or(valid.size()).max(1),
            shuffle: config.shuffle_eval,
            seed: config.seed.wrapping_add(1),
        });
        test.attach_loader(LoaderSpec {
            batch_size: config.max_test_size.unwrap_or(test.size()).max(1),
            shuffle: config.shuffle_eval,
            seed: config.seed.wrapping_add(2),
        });

        Ok(Partitions { train, valid, test })
    }

    fn resolve_reference(&self, train: &Table, valid: &Table) -> Result<ReferenceSet> {
        let table = match &self.config.reference {
            Reference::Train => train.clone(),
            Reference::TrainVal => Table::concat(&[train, valid])?,
            Reference::Table(table) => table.clone(),
        };

        Ok(ReferenceSet::new(table))
    }
}
