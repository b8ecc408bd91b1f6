use ndarray::{Array1, Array2, Array3, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{gather_distances, PartitionedDataset};
use crate::error::Result;

/// How a partition is cut into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderSpec {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Seeds the loader's own shuffling, independent from any other loader.
    pub seed: u64,
}

/// An owned batch of samples.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `b × r × c`
    pub distances: Array3<f32>,
    /// `b × (p + 1)`
    pub x: Array2<f32>,
    /// `b × q`
    pub y: Array2<f32>,
    pub ids: Array1<i64>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A finite, restartable sequence of batches over one partition.
///
/// The tensors are computed before batching starts, a loader only gathers rows.
#[derive(Debug, Clone)]
pub struct DataLoader<'a> {
    dataset: &'a PartitionedDataset,
    batch_size: usize,
    shuffle: bool,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl<'a> DataLoader<'a> {
    pub fn new(dataset: &'a PartitionedDataset, spec: LoaderSpec) -> Self {
        let mut loader = Self {
            dataset,
            batch_size: spec.batch_size.max(1),
            shuffle: spec.shuffle,
            order: (0..dataset.size()).collect(),
            cursor: 0,
            rng: StdRng::seed_from_u64(spec.seed),
        };

        if loader.shuffle {
            loader.order.shuffle(&mut loader.rng);
        }

        loader
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Rewinds to the first batch, drawing a new order when shuffling.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    /// Returns the next batch, or None if exhausted.
    ///
    /// A batch whose distances can't be gathered is returned as an error
    /// instead of ending the epoch early.
    pub fn next_batch(&mut self) -> Option<Result<Batch>> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let rows = &self.order[self.cursor..end];
        self.cursor = end;

        let ds = self.dataset;
        let batch = gather_distances(ds.distances(), ds.model_temporal(), rows).map(|distances| {
            Batch {
                distances,
                x: ds.x_data().select(Axis(0), rows),
                y: ds.y_data().select(Axis(0), rows),
                ids: ds.ids().select(Axis(0), rows),
            }
        });

        Some(batch)
    }
}

impl Iterator for DataLoader<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dataset::Columns, table::Table};

    fn dataset(n: usize) -> PartitionedDataset {
        let data = Array2::from_shape_fn((n, 3), |(i, j)| (i * 10 + j) as f64);
        let frame = Table::new(vec!["x".into(), "y".into(), "id".into()], data).unwrap();
        let columns = Columns {
            x: vec!["x".into()],
            y: vec!["y".into()],
            id: "id".into(),
            spatial: vec![],
            temporal: None,
        };
        PartitionedDataset::new(frame, columns, false, true).unwrap()
    }

    #[test]
    fn batches_respect_size_and_order() {
        let ds = dataset(5);
        let spec = LoaderSpec {
            batch_size: 2,
            shuffle: false,
            seed: 0,
        };
        let mut dl = DataLoader::new(&ds, spec);
        assert_eq!(dl.num_batches(), 3);

        let b1 = dl.next_batch().unwrap().unwrap();
        assert_eq!(b1.ids.to_vec(), vec![2, 12]);
        assert_eq!(b1.x.column(0).to_vec(), vec![0., 10.]);

        let b2 = dl.next_batch().unwrap().unwrap();
        assert_eq!(b2.ids.to_vec(), vec![22, 32]);

        let b3 = dl.next_batch().unwrap().unwrap();
        assert_eq!(b3.len(), 1);
        assert!(dl.next_batch().is_none());

        dl.reset();
        assert_eq!(dl.next_batch().unwrap().unwrap().ids.to_vec(), vec![2, 12]);
    }

    #[test]
    fn shuffled_epochs_cover_every_row() {
        let ds = dataset(9);
        let spec = LoaderSpec {
            batch_size: 4,
            shuffle: true,
            seed: 7,
        };
        let mut dl = DataLoader::new(&ds, spec);

        for _ in 0..3 {
            let mut ids: Vec<i64> = dl.by_ref().flat_map(|b| b.unwrap().ids.to_vec()).collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..9).map(|i| i * 10 + 2).collect::<Vec<i64>>());
            dl.reset();
        }

        let ids = |dl: DataLoader| -> Vec<i64> { dl.flat_map(|b| b.unwrap().ids.to_vec()).collect() };
        let a = ids(DataLoader::new(&ds, spec));
        let b = ids(DataLoader::new(&ds, spec));
        assert_eq!(a, b);
    }
}
