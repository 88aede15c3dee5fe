// Loader assembly: from a family and a few fractions to ready batch loaders
//
//   train split ──select(plain)──► random_split [n_train | n_valid | rest]
//                                      │          │
//                                   train       valid (only if train_pct < 1)
//
//   test split ──select(plain)──────► shuffle_index prefix ──► test
//   test split ──select(adversarial)─► shuffle_index prefix ──► adversarial_test
//                                          (only if at least two classes remain)
//   test split ──select(pair)────────► shuffle_index prefix ──► pairs
//
// A single generator, created per call, feeds every random step.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use digitwise_core::Result;

use crate::combinators::{prefix_subset, random_split};
use crate::dataset::{Dataset, RawDataset};
use crate::family::{Family, Split};
use crate::loader::{DataLoader, DataLoaderConfig};
use crate::select::{shuffle_index, LabelSubset, SelectDataset, SelectMode, SelectOptions};
use crate::transform::{pair_pipeline, standard_pipeline, Transform};

/// Parameters of loader assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderParams {
    /// Fraction of each split that is used at all.
    pub downsample_pct: f64,
    /// Fraction of the downsampled training split used for training; the
    /// remainder becomes the validation set.
    pub train_pct: f64,
    pub batch_size: usize,
    /// Target length of the shorter image edge.
    pub img_size: usize,
    /// Labels to keep, in rank order. `None` keeps every label.
    pub label_subset: Option<LabelSubset>,
    pub num_workers: usize,
    /// Seed of the test-set subsample ordering.
    pub shuffle_seed: u64,
    /// Seed for splitting, retargeting, pairing and batch shuffling.
    /// `None` draws from entropy.
    pub seed: Option<u64>,
    /// Directory holding one subdirectory per family.
    pub root: PathBuf,
    /// Fetch missing files before loading.
    pub download: bool,
}

impl Default for LoaderParams {
    fn default() -> Self {
        Self {
            downsample_pct: 0.5,
            train_pct: 0.8,
            batch_size: 50,
            img_size: 28,
            label_subset: None,
            num_workers: 4,
            shuffle_seed: crate::select::DEFAULT_SHUFFLE_SEED,
            seed: None,
            root: PathBuf::from("/root/DATASET"),
            download: true,
        }
    }
}

impl LoaderParams {
    pub fn downsample_pct(mut self, pct: f64) -> Self {
        self.downsample_pct = pct;
        self
    }

    pub fn train_pct(mut self, pct: f64) -> Self {
        self.train_pct = pct;
        self
    }

    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn img_size(mut self, size: usize) -> Self {
        self.img_size = size;
        self
    }

    pub fn label_subset(mut self, subset: Option<LabelSubset>) -> Self {
        self.label_subset = subset;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn select_options(&self, mode: SelectMode) -> SelectOptions {
        SelectOptions::default()
            .label_subset(self.label_subset.clone())
            .mode(mode)
    }

    fn loader_config(&self, shuffle: bool, seed: Option<u64>) -> DataLoaderConfig {
        let config = DataLoaderConfig::default()
            .batch_size(self.batch_size)
            .shuffle(shuffle)
            .num_workers(self.num_workers);
        match seed {
            Some(s) => config.seed(s),
            None => config,
        }
    }
}

/// `floor(pct * n)` with `pct` clamped into `[0, 1]`.
fn fraction_of(pct: f64, n: usize) -> usize {
    ((pct.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n)
}

fn warn_out_of_range(params: &LoaderParams) {
    for (what, pct) in [
        ("downsample_pct", params.downsample_pct),
        ("train_pct", params.train_pct),
    ] {
        if !(0.0..=1.0).contains(&pct) {
            warn!("{what} = {pct} lies outside [0, 1] and is clamped");
        }
    }
}

/// The loaders for one family.
#[derive(Debug)]
pub struct Loaders {
    pub train: DataLoader,
    /// Absent when `train_pct >= 1.0`.
    pub valid: Option<DataLoader>,
    pub test: DataLoader,
    /// Test examples with every label replaced by a different one. Absent
    /// when fewer than two classes remain after subsetting.
    pub adversarial_test: Option<DataLoader>,
}

fn build_loader<D: Dataset + 'static>(
    dataset: D,
    config: DataLoaderConfig,
    transform: &Arc<dyn Transform>,
) -> Result<DataLoader> {
    Ok(DataLoader::new(Arc::new(dataset), config)?.with_transform(Arc::clone(transform)))
}

/// Select over the test split and keep the reproducible downsampled prefix.
fn test_loader<R: rand::Rng>(
    source: RawDataset,
    mode: SelectMode,
    params: &LoaderParams,
    rng: &mut R,
    transform: &Arc<dyn Transform>,
) -> Result<DataLoader> {
    let selected = SelectDataset::new(source, params.select_options(mode), rng)?;
    let order = shuffle_index(selected.len(), params.shuffle_seed);
    let keep = fraction_of(params.downsample_pct, selected.len());
    let subset = prefix_subset(selected, &order, keep);
    build_loader(subset, params.loader_config(false, None), transform)
}

/// Assemble train/validation/test/adversarial-test loaders from decoded splits.
pub fn assemble(
    train_source: RawDataset,
    test_source: RawDataset,
    params: &LoaderParams,
) -> Result<Loaders> {
    warn_out_of_range(params);
    let mut rng = params.rng();
    let transform: Arc<dyn Transform> = Arc::new(standard_pipeline(params.img_size));

    let train_valid = Arc::new(SelectDataset::new(
        train_source,
        params.select_options(SelectMode::Plain),
        &mut rng,
    )?);
    let total = train_valid.len();
    let downsampled = fraction_of(params.downsample_pct, total);
    let n_train = fraction_of(params.train_pct, downsampled);
    let n_valid = downsampled - n_train;

    let mut splits = random_split(
        train_valid,
        &[n_train, n_valid, total - downsampled],
        &mut rng,
    )?;
    // The third piece is the unused remainder.
    let valid_set = splits.swap_remove(1);
    let train_set = splits.swap_remove(0);
    info!("split {total} training examples into {n_train} train / {n_valid} valid");

    // Loader seeds are derived from the call's seed so a seeded call is
    // reproducible end to end.
    let loader_seed = |offset: u64| params.seed.map(|s| s.wrapping_add(offset));

    let train = build_loader(
        train_set,
        params.loader_config(true, loader_seed(1)),
        &transform,
    )?;
    let valid = if params.train_pct < 1.0 {
        Some(build_loader(
            valid_set,
            params.loader_config(true, loader_seed(2)),
            &transform,
        )?)
    } else {
        None
    };

    let test = test_loader(
        test_source.clone(),
        SelectMode::Plain,
        params,
        &mut rng,
        &transform,
    )?;
    let classes = test.dataset().num_classes();
    let adversarial_test = if classes >= 2 {
        Some(test_loader(
            test_source,
            SelectMode::AdversarialTarget,
            params,
            &mut rng,
            &transform,
        )?)
    } else {
        warn!("only {classes} class(es) selected, skipping the adversarial test loader");
        None
    };

    Ok(Loaders {
        train,
        valid,
        test,
        adversarial_test,
    })
}

/// Assemble the pair loader over a decoded test split.
pub fn assemble_pairs(test_source: RawDataset, params: &LoaderParams) -> Result<DataLoader> {
    warn_out_of_range(params);
    let mut rng = params.rng();
    let transform: Arc<dyn Transform> = Arc::new(pair_pipeline(params.img_size));
    test_loader(test_source, SelectMode::Pair, params, &mut rng, &transform)
}

// Per-family entry points

/// Load both splits of `family` from `params.root` and assemble its loaders.
pub fn load(family: Family, params: &LoaderParams) -> Result<Loaders> {
    let train = family.load(&params.root, Split::Train, params.download)?;
    let test = family.load(&params.root, Split::Test, params.download)?;
    assemble(train, test, params)
}

/// Load the test split of `family` and assemble its pair loader.
pub fn load_pairs(family: Family, params: &LoaderParams) -> Result<DataLoader> {
    let test = family.load(&params.root, Split::Test, params.download)?;
    assemble_pairs(test, params)
}

pub fn load_mnist(params: &LoaderParams) -> Result<Loaders> {
    load(Family::Mnist, params)
}

pub fn load_mnist_pairs(params: &LoaderParams) -> Result<DataLoader> {
    load_pairs(Family::Mnist, params)
}

pub fn load_fmnist(params: &LoaderParams) -> Result<Loaders> {
    load(Family::FashionMnist, params)
}

pub fn load_fmnist_pairs(params: &LoaderParams) -> Result<DataLoader> {
    load_pairs(Family::FashionMnist, params)
}

pub fn load_kmnist(params: &LoaderParams) -> Result<Loaders> {
    load(Family::KMnist, params)
}

pub fn load_kmnist_pairs(params: &LoaderParams) -> Result<DataLoader> {
    load_pairs(Family::KMnist, params)
}

pub fn load_cifar10(params: &LoaderParams) -> Result<Loaders> {
    load(Family::Cifar10, params)
}

pub fn load_cifar10_pairs(params: &LoaderParams) -> Result<DataLoader> {
    load_pairs(Family::Cifar10, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_of_floors_and_clamps() {
        assert_eq!(fraction_of(0.5, 11), 5);
        assert_eq!(fraction_of(1.0, 11), 11);
        assert_eq!(fraction_of(1.7, 11), 11);
        assert_eq!(fraction_of(-0.2, 11), 0);
        assert_eq!(fraction_of(0.8, 0), 0);
    }

    #[test]
    fn params_defaults() {
        let p = LoaderParams::default();
        assert_eq!(p.downsample_pct, 0.5);
        assert_eq!(p.train_pct, 0.8);
        assert_eq!(p.batch_size, 50);
        assert_eq!(p.img_size, 28);
        assert_eq!(p.num_workers, 4);
        assert!(p.label_subset.is_none());
    }

    #[test]
    fn params_from_partial_json() {
        let p: LoaderParams =
            serde_json::from_str(r#"{"batch_size": 10, "label_subset": [1, 7]}"#).unwrap();
        assert_eq!(p.batch_size, 10);
        assert_eq!(p.label_subset.unwrap().labels(), &[1, 7]);
        assert_eq!(p.train_pct, 0.8);
    }
}
