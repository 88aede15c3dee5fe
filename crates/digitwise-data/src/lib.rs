//! # digitwise-data
//!
//! Dataset loading and reshaping for image classification experiments.
//!
//! This crate provides:
//! - [`Dataset`] trait and [`RawDataset`]: decoded images and labels
//! - [`SelectDataset`]: label subsetting with dense remapping, adversarial
//!   retargeting, and differently-labelled pair construction
//! - [`DataLoader`]: batching, shuffling, parallel sample fetching
//! - [`Transform`]: resize / scale / standardize preprocessing
//! - [`Family`]: MNIST, Fashion-MNIST, KMNIST (IDX) and CIFAR-10 readers
//! - [`load`] / [`load_pairs`]: ready-made train/valid/test loaders

pub mod assemble;
pub mod combinators;
pub mod dataset;
pub mod family;
pub mod idx;
pub mod loader;
pub mod select;
pub mod transform;

pub use assemble::{
    assemble, assemble_pairs, load, load_cifar10, load_cifar10_pairs, load_fmnist,
    load_fmnist_pairs, load_kmnist, load_kmnist_pairs, load_mnist, load_mnist_pairs, load_pairs,
    LoaderParams, Loaders,
};
pub use combinators::{prefix_subset, random_split, SubsetDataset};
pub use dataset::{Dataset, RawDataset, Sample};
pub use family::{Family, Split};
pub use loader::{collate, Batch, BatchIterator, DataLoader, DataLoaderConfig};
pub use select::{
    adversarial_targets, filter_and_remap, pair_partners, shuffle_index, LabelIndex, LabelSubset,
    SelectDataset, SelectMode, SelectOptions, DEFAULT_SHUFFLE_SEED, PAIR_PLACEHOLDER_LABEL,
};
pub use transform::Transform;
