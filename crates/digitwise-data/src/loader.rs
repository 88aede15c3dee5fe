// DataLoader: batching, shuffling, iteration

use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use digitwise_core::{bail, Error, Result, Shape};

use crate::dataset::{Dataset, Sample};
use crate::transform::Transform;

/// Configuration for the DataLoader.
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    /// Number of samples per batch.
    pub batch_size: usize,
    /// Whether to shuffle indices each epoch.
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch.
    pub drop_last: bool,
    /// Number of parallel workers for sample fetching (0 = sequential).
    pub num_workers: usize,
    /// Optional random seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            drop_last: false,
            num_workers: 0,
            seed: None,
        }
    }
}

impl DataLoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// One collated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Images, `[B, C, H, W]` flattened.
    pub images: Vec<f32>,
    /// Shape of `images` (and of `partners` when present).
    pub shape: Shape,
    /// Partner images in pair mode, same layout as `images`.
    pub partners: Option<Vec<f32>>,
    /// One label per example.
    pub labels: Vec<usize>,
}

impl Batch {
    /// Number of examples in the batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Stack samples into a batch. All samples must share one image shape, and
/// either all or none must carry a partner.
pub fn collate(samples: Vec<Sample>) -> Result<Batch> {
    let Some(first) = samples.first() else {
        bail!("cannot collate an empty batch");
    };
    let sample_shape = first.shape.clone();
    let paired = first.partner.is_some();
    let per = sample_shape.elem_count();
    let n = samples.len();

    let mut images = Vec::with_capacity(n * per);
    let mut partners = paired.then(|| Vec::with_capacity(n * per));
    let mut labels = Vec::with_capacity(n);

    for s in samples {
        if s.shape != sample_shape {
            return Err(Error::ShapeMismatch {
                expected: sample_shape,
                got: s.shape,
            });
        }
        images.extend_from_slice(&s.image);
        match (&mut partners, s.partner) {
            (Some(out), Some(p)) => out.extend_from_slice(&p),
            (None, None) => {}
            _ => return Err(Error::msg("batch mixes paired and unpaired samples")),
        }
        labels.push(s.label);
    }

    Ok(Batch {
        images,
        shape: sample_shape.batched(n),
        partners,
        labels,
    })
}

/// A DataLoader owns a dataset and produces batches.
///
/// The dataset is held via `Arc<dyn Dataset>` so it can be read from the
/// worker pool.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    config: DataLoaderConfig,
    transforms: Vec<Arc<dyn Transform>>,
    indices: Vec<usize>,
    rng: StdRng,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("config", &self.config)
            .field("len", &self.indices.len())
            .finish_non_exhaustive()
    }
}

impl DataLoader {
    /// Create a new DataLoader over a dataset.
    ///
    /// With `num_workers > 0` a dedicated pool of that many threads is built
    /// for fetching and transforming samples.
    pub fn new(dataset: Arc<dyn Dataset>, config: DataLoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        let pool = if config.num_workers > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.num_workers)
                .thread_name(|i| format!("digitwise-loader-{i}"))
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let indices: Vec<usize> = (0..dataset.len()).collect();
        debug!(
            "loader over {} ({} samples): batch {}, shuffle {}, workers {}",
            dataset.name(),
            dataset.len(),
            config.batch_size,
            config.shuffle,
            config.num_workers
        );
        Ok(Self {
            dataset,
            config,
            transforms: Vec::new(),
            indices,
            rng,
            pool,
        })
    }

    /// Add a transform to apply to each sample.
    pub fn with_transform(mut self, t: Arc<dyn Transform>) -> Self {
        self.transforms.push(t);
        self
    }

    /// The number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.dataset.len() / self.config.batch_size
        } else {
            self.dataset.len().div_ceil(self.config.batch_size)
        }
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.dataset
    }

    /// Reshuffle indices (called at the start of each epoch).
    ///
    /// Each call draws a fresh permutation from the loader's own generator.
    pub fn reshuffle(&mut self) {
        if self.config.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    fn load_sample(&self, index: usize) -> Sample {
        let mut s = self.dataset.get(index);
        for t in &self.transforms {
            s = t.apply(s);
        }
        s
    }

    /// Fetch and transform a slice of samples, on the worker pool if any.
    fn fetch_samples(&self, indices: &[usize]) -> Vec<Sample> {
        match &self.pool {
            Some(pool) if indices.len() > 1 => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.load_sample(i))
                    .collect()
            }),
            _ => indices.iter().map(|&i| self.load_sample(i)).collect(),
        }
    }

    fn batch_at(&self, batch_idx: usize) -> Option<Result<Batch>> {
        let bs = self.config.batch_size;
        let n = self.dataset.len();
        let start = batch_idx * bs;

        if start >= n {
            return None;
        }
        if self.config.drop_last && start + bs > n {
            return None;
        }

        let end = (start + bs).min(n);
        let samples = self.fetch_samples(&self.indices[start..end]);
        Some(collate(samples))
    }

    /// Produce all batches for one epoch.
    pub fn epoch_batches(&mut self) -> Result<Vec<Batch>> {
        self.iter_batches().collect()
    }

    /// Iterate over batches one at a time (lower memory than `epoch_batches`).
    pub fn iter_batches(&mut self) -> BatchIterator<'_> {
        self.reshuffle();
        BatchIterator {
            loader: self,
            batch_idx: 0,
        }
    }
}

/// Iterator that yields one batch at a time.
pub struct BatchIterator<'l> {
    loader: &'l DataLoader,
    batch_idx: usize,
}

impl Iterator for BatchIterator<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.loader.batch_at(self.batch_idx)?;
        self.batch_idx += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.loader.num_batches().saturating_sub(self.batch_idx);
        (left, Some(left))
    }
}

impl ExactSizeIterator for BatchIterator<'_> {}
