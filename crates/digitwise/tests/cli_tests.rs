// End-to-end tests of the facade: synthetic and on-disk sources through the CLI commands

use std::fs;

use clap::Parser;

use digitwise::cli::{self, Cli, Command, SourceArgs};
use digitwise::data::idx::{build_idx1_bytes, build_idx3_bytes};
use digitwise::prelude::*;

fn source_args(args: &[&str]) -> SourceArgs {
    let cli = Cli::try_parse_from(std::iter::once("digitwise").chain(args.iter().copied()))
        .expect("arguments should parse");
    match cli.command {
        Command::Summary(a) | Command::Pairs(a) => a,
    }
}

#[test]
fn test_summary_on_synthetic_data() {
    let args = source_args(&[
        "summary",
        "--synthetic",
        "200",
        "--downsample",
        "1.0",
        "--batch-size",
        "20",
        "--workers",
        "0",
        "--seed",
        "3",
    ]);
    let summaries = cli::summary(&args).unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["train", "valid", "test", "adversarial_test"]);

    assert_eq!(summaries[0].examples, 160);
    assert_eq!(summaries[0].batches, 8);
    assert_eq!(summaries[1].examples, 40);
    assert_eq!(summaries[2].examples, 200);
    assert_eq!(summaries[0].example_shape, vec![1, 28, 28]);
    assert!(summaries[0].pixel_min >= -1.0 && summaries[0].pixel_max <= 1.0);
}

#[test]
fn test_summary_label_subset_and_full_train() {
    let args = source_args(&[
        "summary",
        "--synthetic",
        "300",
        "--labels",
        "2,5,9",
        "--train-pct",
        "1.0",
        "--workers",
        "0",
        "--seed",
        "8",
    ]);
    let summaries = cli::summary(&args).unwrap();
    // no validation loader when everything goes to training
    assert_eq!(summaries.len(), 3);
    for s in &summaries {
        assert!(s.label_counts.keys().all(|&l| l < 3));
    }
}

#[test]
fn test_summary_single_label_has_no_adversarial_loader() {
    let args = source_args(&[
        "summary",
        "--synthetic",
        "200",
        "--labels",
        "4",
        "--workers",
        "0",
        "--seed",
        "2",
    ]);
    let summaries = cli::summary(&args).unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["train", "valid", "test"]);
}

#[test]
fn test_pairs_on_synthetic_cifar_shape() {
    let args = source_args(&[
        "pairs",
        "--family",
        "cifar10",
        "--synthetic",
        "60",
        "--downsample",
        "1.0",
        "--img-size",
        "16",
        "--workers",
        "2",
        "--seed",
        "1",
    ]);
    let summary = cli::pairs(&args).unwrap();
    assert!(summary.paired);
    assert_eq!(summary.examples, 60);
    assert_eq!(summary.example_shape, vec![3, 16, 16]);
    assert_eq!(summary.label_counts.len(), 1);
    assert!(summary.pixel_min >= 0.0 && summary.pixel_max <= 1.0);
}

#[test]
fn test_config_file_with_flag_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("loader.json");
    fs::write(
        &config,
        r#"{"downsample_pct": 1.0, "train_pct": 0.5, "batch_size": 7, "label_subset": [0, 1]}"#,
    )
    .unwrap();

    let args = source_args(&[
        "summary",
        "--config",
        config.to_str().unwrap(),
        "--batch-size",
        "9",
    ]);
    let params = args.params().unwrap();
    assert_eq!(params.batch_size, 9);
    assert_eq!(params.train_pct, 0.5);
    assert_eq!(params.label_subset.unwrap().labels(), &[0, 1]);
}

#[test]
fn test_bad_config_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("broken.json");
    fs::write(&config, "{ not json").unwrap();
    let args = source_args(&["summary", "--config", config.to_str().unwrap()]);
    let err = args.params().unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
}

#[test]
fn test_summary_from_kmnist_files() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(Family::KMnist.dir_name());
    fs::create_dir_all(&dir).unwrap();
    for (prefix, n) in [("train", 50usize), ("t10k", 20)] {
        let images: Vec<Vec<u8>> = (0..n).map(|i| vec![(i * 5) as u8; 16]).collect();
        let refs: Vec<&[u8]> = images.iter().map(Vec::as_slice).collect();
        let labels: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
        fs::write(
            dir.join(format!("{prefix}-images-idx3-ubyte")),
            build_idx3_bytes(&refs, 4, 4),
        )
        .unwrap();
        fs::write(
            dir.join(format!("{prefix}-labels-idx1-ubyte")),
            build_idx1_bytes(&labels),
        )
        .unwrap();
    }

    let args = source_args(&[
        "summary",
        "--family",
        "kmnist",
        "--root",
        root.path().to_str().unwrap(),
        "--no-download",
        "--downsample",
        "1.0",
        "--img-size",
        "4",
        "--workers",
        "0",
    ]);
    let summaries = cli::summary(&args).unwrap();
    assert_eq!(summaries[0].examples, 40);
    assert_eq!(summaries[1].examples, 10);
    assert_eq!(summaries[2].examples, 20);
    assert_eq!(summaries[2].example_shape, vec![1, 4, 4]);
}

#[test]
fn test_prelude_loaders() {
    let params = LoaderParams::default()
        .downsample_pct(1.0)
        .num_workers(0)
        .img_size(28)
        .seed(5);
    let (train, test) = (fixed_split(100, 0), fixed_split(100, 1));
    let mut loaders = assemble(train, test, &params).unwrap();
    let batch: Batch = loaders.train.iter_batches().next().unwrap().unwrap();
    assert_eq!(batch.shape.dims(), &[50, 1, 28, 28]);
}

/// A deterministic 28×28 split built without a generator.
fn fixed_split(n: usize, offset: usize) -> RawDataset {
    let images = (0..n).map(|i| vec![((i + offset) % 256) as u8; 784]).collect();
    let labels = (0..n).map(|i| i % 10).collect();
    RawDataset::new(images, labels, Shape::image(1, 28, 28), 10, "fixed").unwrap()
}
