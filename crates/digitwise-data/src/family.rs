// Dataset families: where each dataset lives on disk and how to decode it
//
// Layout under the data root:
//
//   <root>/MNIST/            train-images-idx3-ubyte[.gz] ...
//   <root>/FashionMNIST/     train-images-idx3-ubyte[.gz] ...
//   <root>/KMNIST/           train-images-idx3-ubyte[.gz] ...
//   <root>/cifar-10-batches-bin/
//                            data_batch_{1..5}.bin, test_batch.bin
//
// IDX families can be downloaded on demand. CIFAR-10 binaries must already be
// extracted.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};

use digitwise_core::{Error, Result, Shape};

use crate::dataset::RawDataset;
use crate::idx;

/// Which split of a family to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// A supported dataset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Mnist,
    FashionMnist,
    #[serde(rename = "kmnist")]
    KMnist,
    Cifar10,
}

impl Family {
    /// Directory under the data root holding this family's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Family::Mnist => "MNIST",
            Family::FashionMnist => "FashionMNIST",
            Family::KMnist => "KMNIST",
            Family::Cifar10 => "cifar-10-batches-bin",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Mnist => "MNIST",
            Family::FashionMnist => "FashionMNIST",
            Family::KMnist => "KMNIST",
            Family::Cifar10 => "CIFAR10",
        }
    }

    pub fn num_classes(self) -> usize {
        10
    }

    /// Base URL the IDX files are fetched from; `None` for families that
    /// are never downloaded.
    pub fn url_base(self) -> Option<&'static str> {
        match self {
            Family::Mnist => Some("https://storage.googleapis.com/cvdf-datasets/mnist"),
            Family::FashionMnist => {
                Some("http://fashion-mnist.s3-website.eu-central-1.amazonaws.com")
            }
            Family::KMnist => Some("http://codh.rois.ac.jp/kmnist/dataset/kmnist"),
            Family::Cifar10 => None,
        }
    }

    /// Load one split from `root`, downloading missing IDX files first when
    /// `download` is set.
    pub fn load(self, root: &Path, split: Split, download: bool) -> Result<RawDataset> {
        let dir = root.join(self.dir_name());
        let name = format!("{}-{}", self.name(), split.as_str());
        let ds = match self {
            Family::Cifar10 => load_cifar10(&dir, split, &name)?,
            _ => {
                let (img_name, lbl_name) = idx_file_names(split);
                if download {
                    self.fetch_missing(&dir, &[img_name, lbl_name])?;
                }
                let img_bytes = idx::read_maybe_gz(&dir, img_name)?;
                let lbl_bytes = idx::read_maybe_gz(&dir, lbl_name)?;
                idx::decode_pair(&img_bytes, &lbl_bytes, self.num_classes(), &name)?
            }
        };
        info!("loaded {name}: {} examples", ds.labels().len());
        Ok(ds)
    }

    /// Download `<name>.gz` for every file absent in both plain and
    /// compressed form.
    fn fetch_missing(self, dir: &Path, names: &[&str]) -> Result<()> {
        let Some(base) = self.url_base() else {
            return Ok(());
        };
        for name in names {
            let plain = dir.join(name);
            let gz = dir.join(format!("{name}.gz"));
            if plain.exists() || gz.exists() {
                continue;
            }
            fs::create_dir_all(dir)?;
            download_file(&format!("{base}/{name}.gz"), &gz)?;
        }
        Ok(())
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "mnist" => Ok(Family::Mnist),
            "fashion_mnist" | "fmnist" => Ok(Family::FashionMnist),
            "kmnist" => Ok(Family::KMnist),
            "cifar10" | "cifar_10" => Ok(Family::Cifar10),
            other => Err(Error::msg(format!("unknown dataset family `{other}`"))),
        }
    }
}

fn idx_file_names(split: Split) -> (&'static str, &'static str) {
    match split {
        Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
        Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
    }
}

#[cfg(feature = "download")]
fn download_file(url: &str, path: &Path) -> Result<()> {
    info!("downloading {url}");
    let resp = ureq::get(url).call().map_err(|e| Error::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    write_atomically(resp.into_reader(), path)
}

/// Stream `reader` into a temporary sibling of `path`, then move it into
/// place. On failure the temporary file is removed and `path` is untouched.
#[cfg(feature = "download")]
fn write_atomically(mut reader: impl Read, path: &Path) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::copy(&mut reader, &mut tmp)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(not(feature = "download"))]
fn download_file(url: &str, _path: &Path) -> Result<()> {
    Err(Error::Download {
        url: url.to_string(),
        reason: "built without the `download` feature".to_string(),
    })
}

// CIFAR-10 binary format
//
// Each record is 1 label byte followed by 3×32×32 pixel bytes, already in
// [C, H, W] planar order. Every batch file holds 10,000 records.

const CIFAR_SIDE: usize = 32;
const CIFAR_CHANNELS: usize = 3;
const CIFAR_IMAGE_BYTES: usize = CIFAR_CHANNELS * CIFAR_SIDE * CIFAR_SIDE;
const CIFAR_RECORD_BYTES: usize = CIFAR_IMAGE_BYTES + 1;

const CIFAR_TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const CIFAR_TEST_FILES: [&str; 1] = ["test_batch.bin"];

/// Parse the records of one CIFAR-10 binary batch.
pub fn parse_cifar_batch(data: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<usize>)> {
    if data.len() % CIFAR_RECORD_BYTES != 0 {
        return Err(Error::Truncated {
            what: "CIFAR-10 batch",
            expected: (data.len() / CIFAR_RECORD_BYTES + 1) * CIFAR_RECORD_BYTES,
            got: data.len(),
        });
    }
    let records = data.len() / CIFAR_RECORD_BYTES;
    let mut images = Vec::with_capacity(records);
    let mut labels = Vec::with_capacity(records);
    for record in data.chunks_exact(CIFAR_RECORD_BYTES) {
        labels.push(usize::from(record[0]));
        images.push(record[1..].to_vec());
    }
    Ok((images, labels))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let mut buf = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut buf)?;
    Ok(buf)
}

fn load_cifar10(dir: &Path, split: Split, name: &str) -> Result<RawDataset> {
    let files: &[&str] = match split {
        Split::Train => &CIFAR_TRAIN_FILES,
        Split::Test => &CIFAR_TEST_FILES,
    };
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for file in files {
        let (imgs, lbls) = parse_cifar_batch(&read_file(&dir.join(file))?)?;
        images.extend(imgs);
        labels.extend(lbls);
    }
    RawDataset::new(
        images,
        labels,
        Shape::image(CIFAR_CHANNELS, CIFAR_SIDE, CIFAR_SIDE),
        Family::Cifar10.num_classes(),
        name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::idx::{build_idx1_bytes, build_idx3_bytes};

    fn cifar_record(label: u8, fill: u8) -> Vec<u8> {
        let mut r = vec![label];
        r.extend(std::iter::repeat(fill).take(CIFAR_IMAGE_BYTES));
        r
    }

    #[test]
    fn test_parse_cifar_batch() {
        let mut data = cifar_record(3, 10);
        data.extend(cifar_record(9, 20));
        let (images, labels) = parse_cifar_batch(&data).unwrap();
        assert_eq!(labels, vec![3, 9]);
        assert_eq!(images[1].len(), CIFAR_IMAGE_BYTES);
        assert!(images[1].iter().all(|&p| p == 20));
    }

    #[test]
    fn test_parse_cifar_batch_truncated() {
        let mut data = cifar_record(3, 10);
        data.pop();
        assert!(matches!(
            parse_cifar_batch(&data),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_load_cifar_test_split() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(Family::Cifar10.dir_name());
        fs::create_dir_all(&dir).unwrap();
        let mut data = cifar_record(1, 0);
        data.extend(cifar_record(2, 255));
        fs::write(dir.join("test_batch.bin"), data).unwrap();

        let ds = Family::Cifar10.load(root.path(), Split::Test, true).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.image_shape().dims(), &[3, 32, 32]);
        assert_eq!(ds.name(), "CIFAR10-test");
        assert_eq!(ds.labels(), &[1, 2]);
    }

    #[test]
    fn test_load_cifar_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let err = Family::Cifar10
            .load(root.path(), Split::Train, false)
            .unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn test_load_idx_family_from_disk() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(Family::FashionMnist.dir_name());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("train-images-idx3-ubyte"),
            build_idx3_bytes(&[&[1u8; 9], &[2u8; 9], &[3u8; 9]], 3, 3),
        )
        .unwrap();
        fs::write(
            dir.join("train-labels-idx1-ubyte"),
            build_idx1_bytes(&[0, 5, 9]),
        )
        .unwrap();

        // Files present, so no download is attempted.
        let ds = Family::FashionMnist
            .load(root.path(), Split::Train, true)
            .unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.labels(), &[0, 5, 9]);
        assert_eq!(ds.image_shape().dims(), &[1, 3, 3]);
        assert_eq!(ds.name(), "FashionMNIST-train");
    }

    #[cfg(feature = "download")]
    #[test]
    fn test_write_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("labels.gz");
        write_atomically(&b"payload"[..], &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"payload");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(feature = "download")]
    #[test]
    fn test_write_atomically_failed_stream_leaves_nothing() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("images.gz");
        let err = write_atomically(Broken, &target).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!("MNIST".parse::<Family>().unwrap(), Family::Mnist);
        assert_eq!("fashion-mnist".parse::<Family>().unwrap(), Family::FashionMnist);
        assert_eq!("fmnist".parse::<Family>().unwrap(), Family::FashionMnist);
        assert_eq!("cifar10".parse::<Family>().unwrap(), Family::Cifar10);
        assert!("svhn".parse::<Family>().is_err());
    }

    #[test]
    fn test_family_serde_names() {
        let f: Family = serde_json::from_str("\"fashion_mnist\"").unwrap();
        assert_eq!(f, Family::FashionMnist);
        assert_eq!(serde_json::to_string(&Family::Cifar10).unwrap(), "\"cifar10\"");
        assert_eq!(serde_json::to_string(&Family::KMnist).unwrap(), "\"kmnist\"");
    }
}
