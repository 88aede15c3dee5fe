// IDX file format: the container used by MNIST and its siblings
//
// Each split of an IDX family is two files:
//   - <prefix>-images-idx3-ubyte   (count × rows × cols pixels)
//   - <prefix>-labels-idx1-ubyte   (count labels)
//
// IDX format (all values big-endian):
//   images: magic(2051) | count(u32) | rows(u32) | cols(u32) | pixel_data(u8...)
//   labels: magic(2049) | count(u32) | label_data(u8...)
//
// Files are distributed gzip-compressed (.gz); both the plain and the
// compressed form are accepted, plain first.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use log::debug;

use digitwise_core::{Error, Result, Shape};

use crate::dataset::RawDataset;

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// Read `dir/base_name`, falling back to `dir/base_name.gz`.
pub fn read_maybe_gz(dir: &Path, base_name: &str) -> Result<Vec<u8>> {
    let plain = dir.join(base_name);
    let gz = dir.join(format!("{base_name}.gz"));

    if plain.exists() {
        debug!("reading {}", plain.display());
        Ok(fs::read(&plain)?)
    } else if gz.exists() {
        debug!("reading {}", gz.display());
        let compressed = fs::read(&gz)?;
        let mut out = Vec::new();
        GzDecoder::new(compressed.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    } else {
        Err(Error::MissingFile(plain))
    }
}

/// Parse an IDX3 file (images): magic=2051, count, rows, cols, data.
///
/// Returns the images and their `(rows, cols)`.
pub fn parse_idx3_images(data: &[u8]) -> Result<(Vec<Vec<u8>>, usize, usize)> {
    if data.len() < 16 {
        return Err(Error::Truncated {
            what: "IDX3 header",
            expected: 16,
            got: data.len(),
        });
    }

    let magic = read_u32_be(data, 0);
    if magic != IMAGES_MAGIC {
        return Err(Error::InvalidMagic {
            expected: IMAGES_MAGIC,
            got: magic,
        });
    }

    let count = read_u32_be(data, 4) as usize;
    let rows = read_u32_be(data, 8) as usize;
    let cols = read_u32_be(data, 12) as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::msg(format!("IDX3 images of size {rows}x{cols}")));
    }

    // Header fields are untrusted; a size that does not fit in usize can
    // never be backed by the buffer.
    let expected_len = rows
        .checked_mul(cols)
        .and_then(|pixels| pixels.checked_mul(count))
        .and_then(|body| body.checked_add(16));
    let expected_len = match expected_len {
        Some(len) if len <= data.len() => len,
        _ => {
            return Err(Error::Truncated {
                what: "IDX3 file",
                expected: expected_len.unwrap_or(usize::MAX),
                got: data.len(),
            })
        }
    };
    let pixels_per_image = rows * cols;

    let images = data[16..expected_len]
        .chunks_exact(pixels_per_image)
        .take(count)
        .map(<[u8]>::to_vec)
        .collect();

    Ok((images, rows, cols))
}

/// Parse an IDX1 file (labels): magic=2049, count, data.
pub fn parse_idx1_labels(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::Truncated {
            what: "IDX1 header",
            expected: 8,
            got: data.len(),
        });
    }

    let magic = read_u32_be(data, 0);
    if magic != LABELS_MAGIC {
        return Err(Error::InvalidMagic {
            expected: LABELS_MAGIC,
            got: magic,
        });
    }

    let count = read_u32_be(data, 4) as usize;
    let expected_len = count.saturating_add(8);
    if data.len() < expected_len {
        return Err(Error::Truncated {
            what: "IDX1 file",
            expected: expected_len,
            got: data.len(),
        });
    }

    Ok(data[8..expected_len].to_vec())
}

/// Decode an image/label file pair into a grayscale [`RawDataset`].
pub fn decode_pair(
    image_bytes: &[u8],
    label_bytes: &[u8],
    num_classes: usize,
    name: &str,
) -> Result<RawDataset> {
    let (images, rows, cols) = parse_idx3_images(image_bytes)?;
    let labels = parse_idx1_labels(label_bytes)?;

    if images.len() != labels.len() {
        return Err(Error::CountMismatch {
            images: images.len(),
            labels: labels.len(),
        });
    }

    let labels = labels.into_iter().map(usize::from).collect();
    RawDataset::new(images, labels, Shape::image(1, rows, cols), num_classes, name)
}

/// Read a big-endian u32 from `data` at byte offset `off`.
fn read_u32_be(data: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

// Builder helpers

/// Build IDX3 image bytes from raw image data (useful for tests).
pub fn build_idx3_bytes(images: &[&[u8]], rows: u32, cols: u32) -> Vec<u8> {
    let count = images.len() as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(&rows.to_be_bytes());
    buf.extend_from_slice(&cols.to_be_bytes());
    for img in images {
        buf.extend_from_slice(img);
    }
    buf
}

/// Build IDX1 label bytes (useful for tests).
pub fn build_idx1_bytes(labels: &[u8]) -> Vec<u8> {
    let count = labels.len() as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(labels);
    buf
}
