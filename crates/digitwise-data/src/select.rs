// Selection: label subsetting, adversarial retargeting, pair construction
//
// A SelectDataset is built once from a RawDataset and never changes after.
// The steps run in a fixed order:
//
//   1. label subset: keep only listed labels, relabel each by its position
//      in the list (so the kept labels become 0..k)
//   2. mode:
//        Plain              nothing more
//        AdversarialTarget  every label replaced by a uniformly drawn
//                           different label
//        Pair               every example gets a partner drawn uniformly
//                           from the examples with a different label; all
//                           labels become 0
//
// All randomness comes from the generator handed to `SelectDataset::new`.

use std::collections::HashMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use digitwise_core::{Error, Result, Shape};

use crate::dataset::{Dataset, RawDataset, Sample};

/// Seed used for the reproducible test-set subsample ordering.
pub const DEFAULT_SHUFFLE_SEED: u64 = 0;

/// Label assigned to every example in pair mode.
pub const PAIR_PLACEHOLDER_LABEL: usize = 0;

// LabelSubset

/// An ordered list of kept labels and their dense remapping.
///
/// The label at position `i` of the list maps to `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct LabelSubset {
    labels: Vec<usize>,
    remap: HashMap<usize, usize>,
}

impl LabelSubset {
    /// Build the subset. Each label may appear only once.
    pub fn new(labels: Vec<usize>) -> Result<Self> {
        let mut remap = HashMap::with_capacity(labels.len());
        for (rank, &label) in labels.iter().enumerate() {
            if remap.insert(label, rank).is_some() {
                return Err(Error::DuplicateLabel { label });
            }
        }
        Ok(Self { labels, remap })
    }

    /// Dense rank of `label`, or `None` if the label is not kept.
    pub fn remap(&self, label: usize) -> Option<usize> {
        self.remap.get(&label).copied()
    }

    /// The kept labels in rank order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl TryFrom<Vec<usize>> for LabelSubset {
    type Error = Error;

    fn try_from(labels: Vec<usize>) -> Result<Self> {
        LabelSubset::new(labels)
    }
}

impl From<LabelSubset> for Vec<usize> {
    fn from(subset: LabelSubset) -> Self {
        subset.labels
    }
}

// Options

/// What the dataset does with its labels after subsetting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    /// Keep (remapped) ground-truth labels.
    #[default]
    Plain,
    /// Replace every label with a random different one.
    AdversarialTarget,
    /// Attach a differently-labelled partner image; labels become 0.
    Pair,
}

/// Immutable configuration of a [`SelectDataset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub label_subset: Option<LabelSubset>,
    pub mode: SelectMode,
}

impl SelectOptions {
    pub fn label_subset(mut self, subset: Option<LabelSubset>) -> Self {
        self.label_subset = subset;
        self
    }

    pub fn mode(mut self, mode: SelectMode) -> Self {
        self.mode = mode;
        self
    }
}

// Building blocks

/// Keep the examples whose label is in `subset`, relabelled to their rank.
///
/// One linear scan; relative order of the kept examples is preserved.
pub fn filter_and_remap<T>(
    items: Vec<T>,
    labels: Vec<usize>,
    subset: &LabelSubset,
) -> (Vec<T>, Vec<usize>) {
    let mut kept_items = Vec::new();
    let mut kept_labels = Vec::new();
    for (item, label) in items.into_iter().zip(labels) {
        if let Some(rank) = subset.remap(label) {
            kept_items.push(item);
            kept_labels.push(rank);
        }
    }
    (kept_items, kept_labels)
}

/// Draw, for every label, a replacement uniformly from `0..num_classes`
/// excluding the label itself.
pub fn adversarial_targets<R: Rng>(
    labels: &[usize],
    num_classes: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    if labels.is_empty() {
        return Ok(Vec::new());
    }
    if num_classes < 2 {
        return Err(Error::NoAlternativeLabel {
            classes: num_classes,
        });
    }
    labels
        .iter()
        .map(|&truth| {
            if truth >= num_classes {
                return Err(Error::msg(format!(
                    "label {truth} outside 0..{num_classes}"
                )));
            }
            // Draw from num_classes - 1 slots and skip over the truth.
            let r = rng.gen_range(0..num_classes - 1);
            Ok(if r >= truth { r + 1 } else { r })
        })
        .collect()
}

/// Examples partitioned by label.
///
/// Lets a partner with a different label be drawn uniformly in time
/// proportional to the number of classes instead of by rejection sampling.
#[derive(Debug, Clone)]
pub struct LabelIndex {
    /// `buckets[l]` holds the indices of every example labelled `l`.
    buckets: Vec<Vec<usize>>,
    total: usize,
}

impl LabelIndex {
    pub fn new(labels: &[usize]) -> Self {
        let classes = labels.iter().copied().max().map_or(0, |m| m + 1);
        let mut buckets = vec![Vec::new(); classes];
        for (i, &l) in labels.iter().enumerate() {
            buckets[l].push(i);
        }
        Self {
            buckets,
            total: labels.len(),
        }
    }

    /// Number of examples carrying `label`.
    pub fn count(&self, label: usize) -> usize {
        self.buckets.get(label).map_or(0, Vec::len)
    }

    /// Indices of the examples carrying `label`.
    pub fn indices(&self, label: usize) -> &[usize] {
        self.buckets.get(label).map_or(&[][..], Vec::as_slice)
    }

    /// An index drawn uniformly from every example whose label is not `label`.
    pub fn draw_other<R: Rng>(&self, label: usize, rng: &mut R) -> Result<usize> {
        let others = self.total - self.count(label);
        if others == 0 {
            return Err(Error::NoPartner { label });
        }
        let mut r = rng.gen_range(0..others);
        for (l, bucket) in self.buckets.iter().enumerate() {
            if l == label {
                continue;
            }
            if r < bucket.len() {
                return Ok(bucket[r]);
            }
            r -= bucket.len();
        }
        Err(Error::NoPartner { label })
    }
}

/// Pick a partner index for every example: uniform over the examples whose
/// label differs. A partner is therefore never the example itself.
pub fn pair_partners<R: Rng>(labels: &[usize], rng: &mut R) -> Result<Vec<usize>> {
    let index = LabelIndex::new(labels);
    labels
        .iter()
        .map(|&label| index.draw_other(label, rng))
        .collect()
}

/// A reproducible permutation of `0..len` for the given seed.
///
/// Depends only on `(len, seed)`, never on shared generator state.
pub fn shuffle_index(len: usize, seed: u64) -> Vec<usize> {
    let mut index: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    index.shuffle(&mut rng);
    index
}

// SelectDataset

/// A filtered, relabelled and optionally paired or retargeted copy of a
/// [`RawDataset`].
#[derive(Debug, Clone)]
pub struct SelectDataset {
    images: Vec<Vec<u8>>,
    /// Labels handed out by `get`.
    labels: Vec<usize>,
    /// Ground truth after remapping, before retargeting or pairing.
    true_labels: Vec<usize>,
    partners: Option<Vec<usize>>,
    shape: Shape,
    num_classes: usize,
    options: SelectOptions,
    name: String,
}

impl SelectDataset {
    pub fn new<R: Rng>(source: RawDataset, options: SelectOptions, rng: &mut R) -> Result<Self> {
        let (images, labels, shape, mut num_classes, name) = source.into_parts();
        let total = images.len();

        let (images, labels) = match &options.label_subset {
            Some(subset) => {
                let kept = filter_and_remap(images, labels, subset);
                num_classes = subset.len();
                kept
            }
            None => (images, labels),
        };
        debug!(
            "{name}: kept {} of {total} examples across {num_classes} classes",
            images.len()
        );
        if images.is_empty() && total > 0 {
            warn!("{name}: label subset selected no examples");
        }

        let true_labels = labels.clone();
        let (labels, partners) = match options.mode {
            SelectMode::Plain => (labels, None),
            SelectMode::AdversarialTarget => {
                (adversarial_targets(&labels, num_classes, rng)?, None)
            }
            SelectMode::Pair => {
                let partners = pair_partners(&labels, rng)?;
                (vec![PAIR_PLACEHOLDER_LABEL; labels.len()], Some(partners))
            }
        };

        info!(
            "selected {name}: {} examples, {num_classes} classes, mode {:?}",
            images.len(),
            options.mode
        );

        Ok(Self {
            images,
            labels,
            true_labels,
            partners,
            shape,
            num_classes,
            options,
            name,
        })
    }

    /// Ground-truth label of example `i` after remapping.
    pub fn true_label(&self, i: usize) -> usize {
        self.true_labels[i]
    }

    /// Label handed out for example `i`.
    pub fn label(&self, i: usize) -> usize {
        self.labels[i]
    }

    /// Index of the partner of example `i` (pair mode only).
    pub fn partner_index(&self, i: usize) -> Option<usize> {
        self.partners.as_ref().map(|p| p[i])
    }

    pub fn options(&self) -> &SelectOptions {
        &self.options
    }
}

fn to_f32(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&p| p as f32).collect()
}

impl Dataset for SelectDataset {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn get(&self, index: usize) -> Sample {
        Sample {
            image: to_f32(&self.images[index]),
            shape: self.shape.clone(),
            partner: self
                .partner_index(index)
                .map(|p| to_f32(&self.images[p])),
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
