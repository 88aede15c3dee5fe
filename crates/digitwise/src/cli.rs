// CLI: build loaders from flags or a JSON config and report what they yield
//
// Flags override the config file, which overrides the built-in defaults.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use digitwise_core::Shape;
use digitwise_data::{
    assemble, assemble_pairs, load, load_pairs, Family, LabelSubset, LoaderParams, RawDataset,
};

use crate::summary::LoaderSummary;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the train/valid/test/adversarial loaders and summarise one epoch of each
    Summary(SourceArgs),
    /// Build the pair loader over the test split and summarise one epoch
    Pairs(SourceArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Dataset family: mnist, fashion_mnist, kmnist or cifar10
    #[arg(long, default_value = "mnist")]
    pub family: Family,
    /// JSON file with loader parameters
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding one subdirectory per family
    #[arg(long)]
    pub root: Option<PathBuf>,
    #[arg(long)]
    pub downsample: Option<f64>,
    #[arg(long)]
    pub train_pct: Option<f64>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub img_size: Option<usize>,
    /// Labels to keep, e.g. `--labels 3,8`
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<usize>>,
    #[arg(long)]
    pub workers: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub shuffle_seed: Option<u64>,
    /// Never fetch missing files
    #[arg(long)]
    pub no_download: bool,
    /// Use N random images per split instead of files on disk
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,
    /// Print summaries as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourceArgs {
    /// Resolve the loader parameters: defaults, then the config file, then flags.
    pub fn params(&self) -> anyhow::Result<LoaderParams> {
        let mut params = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => LoaderParams::default(),
        };

        if let Some(root) = &self.root {
            params.root = root.clone();
        }
        if let Some(pct) = self.downsample {
            params.downsample_pct = pct;
        }
        if let Some(pct) = self.train_pct {
            params.train_pct = pct;
        }
        if let Some(bs) = self.batch_size {
            params.batch_size = bs;
        }
        if let Some(size) = self.img_size {
            params.img_size = size;
        }
        if let Some(labels) = &self.labels {
            params.label_subset = Some(LabelSubset::new(labels.clone())?);
        }
        if let Some(n) = self.workers {
            params.num_workers = n;
        }
        if let Some(seed) = self.seed {
            params.seed = Some(seed);
        }
        if let Some(seed) = self.shuffle_seed {
            params.shuffle_seed = seed;
        }
        if self.no_download {
            params.download = false;
        }
        Ok(params)
    }

    /// Synthetic `(train, test)` splits shaped like the selected family.
    fn synthetic_splits(&self, n: usize, params: &LoaderParams) -> (RawDataset, RawDataset) {
        let shape = match self.family {
            Family::Cifar10 => Shape::image(3, 32, 32),
            _ => Shape::image(1, 28, 28),
        };
        let classes = self.family.num_classes();
        let mut rng = StdRng::seed_from_u64(params.seed.unwrap_or(0));
        let train = RawDataset::synthetic(n, shape.clone(), classes, &mut rng);
        let test = RawDataset::synthetic(n, shape, classes, &mut rng);
        (train, test)
    }
}

fn report(summaries: &[LoaderSummary], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summaries)?);
    } else {
        for s in summaries {
            println!("{s}");
        }
    }
    Ok(())
}

/// Run the `summary` command and return what it printed.
pub fn summary(args: &SourceArgs) -> anyhow::Result<Vec<LoaderSummary>> {
    let params = args.params()?;
    info!("building {} loaders with {params:?}", args.family.name());
    let mut loaders = match args.synthetic {
        Some(n) => {
            let (train, test) = args.synthetic_splits(n, &params);
            assemble(train, test, &params)?
        }
        None => load(args.family, &params)
            .with_context(|| format!("loading {}", args.family.name()))?,
    };
    let summaries = LoaderSummary::collect_all(&mut loaders)?;
    report(&summaries, args.json)?;
    Ok(summaries)
}

/// Run the `pairs` command and return what it printed.
pub fn pairs(args: &SourceArgs) -> anyhow::Result<LoaderSummary> {
    let params = args.params()?;
    info!("building {} pair loader with {params:?}", args.family.name());
    let mut loader = match args.synthetic {
        Some(n) => {
            let (_, test) = args.synthetic_splits(n, &params);
            assemble_pairs(test, &params)?
        }
        None => load_pairs(args.family, &params)
            .with_context(|| format!("loading {}", args.family.name()))?,
    };
    let summary = LoaderSummary::collect("pairs", &mut loader)?;
    report(std::slice::from_ref(&summary), args.json)?;
    Ok(summary)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Summary(args) => summary(&args).map(|_| ()),
        Command::Pairs(args) => pairs(&args).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("digitwise").chain(args.iter().copied())).unwrap()
    }

    fn source(cli: Cli) -> SourceArgs {
        match cli.command {
            Command::Summary(a) | Command::Pairs(a) => a,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = source(parse(&[
            "summary",
            "--family",
            "fashion-mnist",
            "--labels",
            "3,8",
            "--batch-size",
            "10",
            "--seed",
            "4",
            "--no-download",
        ]));
        assert_eq!(args.family, Family::FashionMnist);
        let p = args.params().unwrap();
        assert_eq!(p.label_subset.unwrap().labels(), &[3, 8]);
        assert_eq!(p.batch_size, 10);
        assert_eq!(p.seed, Some(4));
        assert!(!p.download);
        assert_eq!(p.train_pct, 0.8);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let args = source(parse(&["pairs", "--labels", "1,1"]));
        assert!(args.params().is_err());
    }

    #[test]
    fn test_unknown_family_rejected() {
        let res = Cli::try_parse_from(["digitwise", "summary", "--family", "svhn"]);
        assert!(res.is_err());
    }
}
