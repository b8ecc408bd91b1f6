use std::ops::Range;

use crate::error::{DatasetErr, Result};

/// Absorbs float noise so `0.8 * 100` lands on row 80 and not 79.
const RATIO_EPS: f64 = 1e-9;

/// `floor(ratio * total)` as a row count.
pub(crate) fn ratio_rows(ratio: f64, total: usize) -> usize {
    (ratio * total as f64 + RATIO_EPS).floor() as usize
}

/// Row positions (into the shuffled table) of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SplitPlan {
    pub train: Vec<usize>,
    pub valid: Range<usize>,
    pub test: Range<usize>,
}

/// Splits `total` shuffled rows into contiguous train/validation/test blocks.
///
/// Properties:
/// - The test block is the trailing `test_ratio` of the rows.
/// - The validation window has width `valid_ratio * total` and starts at
///   `fold * valid_ratio * total`, it's carved out of the remaining pool.
/// - Training is the pool minus the window, so the three are disjoint and
///   cover `[0..total)`.
pub(crate) fn split_plan(
    total: usize,
    test_ratio: f64,
    valid_ratio: f64,
    fold: usize,
) -> Result<SplitPlan> {
    if !(0.0..1.0).contains(&test_ratio) {
        return Err(DatasetErr::InvalidArgument(format!(
            "test_ratio must be in [0, 1), got {test_ratio}"
        )));
    }

    if !(0.0..=1.0).contains(&valid_ratio) {
        return Err(DatasetErr::InvalidArgument(format!(
            "valid_ratio must be in [0, 1], got {valid_ratio}"
        )));
    }

    let pool = ratio_rows(1. - test_ratio, total).min(total);
    let start = ratio_rows(fold as f64 * valid_ratio, total);
    let end = ratio_rows((fold + 1) as f64 * valid_ratio, total).min(pool);

    if start > pool || (start == pool && valid_ratio > 0. && pool > 0) {
        return Err(DatasetErr::InvalidArgument(format!(
            "validation window {fold} starts at row {start}, past the {pool} training rows"
        )));
    }

    let train = (0..start).chain(end..pool).collect();

    Ok(SplitPlan {
        train,
        valid: start..end,
        test: pool..total,
    })
}
