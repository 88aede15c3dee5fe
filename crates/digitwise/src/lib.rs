//! # digitwise
//!
//! Label-subset, adversarial-target and pair loaders for small image
//! classification datasets.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```no_run
//! use digitwise::prelude::*;
//!
//! let params = LoaderParams::default()
//!     .label_subset(Some(LabelSubset::new(vec![3, 8]).unwrap()))
//!     .seed(42);
//! let mut loaders = load_mnist(&params).unwrap();
//! for batch in loaders.train.iter_batches() {
//!     let batch = batch.unwrap();
//!     assert!(batch.labels.iter().all(|&l| l < 2));
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `digitwise-core` | Shape, Error, Result |
//! | `digitwise-data` | Dataset, selection, transforms, DataLoader, dataset families |
//!
//! ## Modules
//!
//! - [`cli`]: argument parsing and command dispatch for the `digitwise` binary
//! - [`summary`]: per-loader statistics gathered over one epoch

/// Re-export core types.
pub use digitwise_core::{bail, Error, Result, Shape};

/// Re-export the data crate.
pub mod data {
    pub use digitwise_data::*;
}

/// Command-line front end.
pub mod cli;

/// Loader statistics.
pub mod summary;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::data::{
        assemble, assemble_pairs, load, load_cifar10, load_cifar10_pairs, load_fmnist,
        load_fmnist_pairs, load_kmnist, load_kmnist_pairs, load_mnist, load_mnist_pairs,
        load_pairs, LoaderParams, Loaders,
    };
    pub use crate::data::{
        Batch, DataLoader, DataLoaderConfig, Dataset, Family, RawDataset, Sample, Split,
    };
    pub use crate::data::{LabelSubset, SelectDataset, SelectMode, SelectOptions};
    pub use crate::summary::LoaderSummary;
    pub use crate::{Error, Result, Shape};
}
