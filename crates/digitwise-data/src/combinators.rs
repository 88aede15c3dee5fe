// Dataset Combinators: subsets and random splits

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use digitwise_core::{Error, Result, Shape};

use crate::dataset::{Dataset, Sample};

// SubsetDataset: view of selected indices

/// A dataset that exposes only the samples at the given indices.
///
/// This is what train/validation splits and downsampled test sets are made of.
pub struct SubsetDataset<D: Dataset> {
    inner: D,
    indices: Vec<usize>,
}

impl<D: Dataset> SubsetDataset<D> {
    /// Create a subset of `inner` containing only the samples at `indices`.
    ///
    /// # Panics
    /// Panics (lazily, at `get` time) if any index is out of range.
    pub fn new(inner: D, indices: Vec<usize>) -> Self {
        Self { inner, indices }
    }

    /// Positions in the inner dataset, in subset order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dataset> Dataset for SubsetDataset<D> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Sample {
        self.inner.get(self.indices[index])
    }

    fn image_shape(&self) -> &Shape {
        self.inner.image_shape()
    }

    fn num_classes(&self) -> usize {
        self.inner.num_classes()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// Random split

/// Split a dataset into non-overlapping random subsets of the given lengths.
///
/// One permutation of all indices is drawn from `rng` and cut into
/// consecutive pieces. The lengths must add up to `dataset.len()`.
pub fn random_split<D, R>(
    dataset: D,
    lengths: &[usize],
    rng: &mut R,
) -> Result<Vec<SubsetDataset<D>>>
where
    D: Dataset + Clone,
    R: Rng,
{
    let n = dataset.len();
    let expected: usize = lengths.iter().sum();
    if expected != n {
        return Err(Error::SplitLengths { total: n, expected });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let mut splits = Vec::with_capacity(lengths.len());
    let mut offset = 0;
    for &len in lengths {
        splits.push(SubsetDataset::new(
            dataset.clone(),
            indices[offset..offset + len].to_vec(),
        ));
        offset += len;
    }
    debug!("split {} examples into {:?}", n, lengths);

    Ok(splits)
}

/// The first `n` entries of `order` as a subset (clamped to the order length).
///
/// Paired with `shuffle_index` this gives a reproducible downsample.
pub fn prefix_subset<D: Dataset>(dataset: D, order: &[usize], n: usize) -> SubsetDataset<D> {
    let n = n.min(order.len());
    SubsetDataset::new(dataset, order[..n].to_vec())
}

// Tests
