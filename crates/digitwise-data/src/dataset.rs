// Dataset trait: unified interface for any image classification source

use std::sync::Arc;

use rand::Rng;

use digitwise_core::{Error, Result, Shape};

/// A single example: a channel-first image, its label, and in pair mode the
/// partner image drawn from a differently-labelled example.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Pixel values, `[C, H, W]` planar layout, flattened.
    pub image: Vec<f32>,
    /// Shape of `image` (and of `partner` when present).
    pub shape: Shape,
    /// Partner image for pair mode.
    pub partner: Option<Vec<f32>>,
    /// Class index (already remapped when a label subset is in effect).
    pub label: usize,
}

/// A dataset is an indexed collection of samples.
///
/// Implementations must be `Send + Sync` so the DataLoader can read from its
/// worker threads.
pub trait Dataset: Send + Sync {
    /// Total number of samples in the dataset.
    fn len(&self) -> usize;

    /// Whether the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the sample at position `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.len()`.
    fn get(&self, index: usize) -> Sample;

    /// The shape of a single image (without batch dim).
    fn image_shape(&self) -> &Shape;

    /// Number of distinct classes labels are drawn from.
    fn num_classes(&self) -> usize;

    /// Optional human-readable name.
    fn name(&self) -> &str {
        "dataset"
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Sample {
        (**self).get(index)
    }

    fn image_shape(&self) -> &Shape {
        (**self).image_shape()
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Decoded source data, held entirely in memory.
///
/// Images are raw `u8` pixels in `[C, H, W]` planar layout; labels are the
/// original class indices of the family.
#[derive(Debug, Clone)]
pub struct RawDataset {
    images: Vec<Vec<u8>>,
    labels: Vec<usize>,
    shape: Shape,
    num_classes: usize,
    name: String,
}

impl RawDataset {
    /// Build a dataset from decoded images and labels.
    ///
    /// Every image must hold exactly `shape.elem_count()` bytes.
    pub fn new(
        images: Vec<Vec<u8>>,
        labels: Vec<usize>,
        shape: Shape,
        num_classes: usize,
        name: impl Into<String>,
    ) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(Error::CountMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        shape.channels()?;
        let expected = shape.elem_count();
        if let Some(bad) = images.iter().find(|img| img.len() != expected) {
            return Err(Error::msg(format!(
                "image holds {} bytes, shape {} needs {}",
                bad.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            images,
            labels,
            shape,
            num_classes,
            name: name.into(),
        })
    }

    /// Create a small synthetic dataset: `n` random images with labels drawn
    /// uniformly from `0..num_classes`.
    pub fn synthetic<R: Rng>(
        n: usize,
        shape: Shape,
        num_classes: usize,
        rng: &mut R,
    ) -> Self {
        let len = shape.elem_count();
        let mut images = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let mut img = vec![0u8; len];
            rng.fill(img.as_mut_slice());
            images.push(img);
            labels.push(rng.gen_range(0..num_classes.max(1)));
        }
        Self {
            images,
            labels,
            shape,
            num_classes,
            name: "synthetic".to_string(),
        }
    }

    /// Raw pixels of example `i`.
    pub fn image_u8(&self, i: usize) -> &[u8] {
        &self.images[i]
    }

    /// Label of example `i`.
    pub fn label(&self, i: usize) -> usize {
        self.labels[i]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Take only the first `n` examples (useful for quick experiments).
    pub fn take(mut self, n: usize) -> Self {
        let n = n.min(self.images.len());
        self.images.truncate(n);
        self.labels.truncate(n);
        self
    }

    /// Decompose into `(images, labels, shape, num_classes, name)`.
    pub fn into_parts(self) -> (Vec<Vec<u8>>, Vec<usize>, Shape, usize, String) {
        (
            self.images,
            self.labels,
            self.shape,
            self.num_classes,
            self.name,
        )
    }
}

impl Dataset for RawDataset {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn get(&self, index: usize) -> Sample {
        Sample {
            image: self.images[index].iter().map(|&p| p as f32).collect(),
            shape: self.shape.clone(),
            partner: None,
            label: self.labels[index],
        }
    }

    fn image_shape(&self) -> &Shape {
        &self.shape
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn name(&self) -> &str {
        &self.name
    }
}
