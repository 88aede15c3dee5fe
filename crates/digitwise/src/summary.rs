// Summary: one pass over a loader, reduced to counts and ranges

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use digitwise_core::Result;
use digitwise_data::{DataLoader, Loaders};

/// What one epoch of a loader looks like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoaderSummary {
    pub name: String,
    pub examples: usize,
    pub batches: usize,
    /// Shape of one example, without the batch dimension.
    pub example_shape: Vec<usize>,
    /// Number of examples per emitted label.
    pub label_counts: BTreeMap<usize, usize>,
    pub paired: bool,
    pub pixel_min: f32,
    pub pixel_max: f32,
}

impl LoaderSummary {
    /// Run `loader` for one epoch and record what it produced.
    pub fn collect(name: impl Into<String>, loader: &mut DataLoader) -> Result<Self> {
        let mut summary = Self {
            name: name.into(),
            examples: 0,
            batches: 0,
            example_shape: loader.dataset().image_shape().dims().to_vec(),
            label_counts: BTreeMap::new(),
            paired: false,
            pixel_min: f32::INFINITY,
            pixel_max: f32::NEG_INFINITY,
        };

        for batch in loader.iter_batches() {
            let batch = batch?;
            summary.batches += 1;
            summary.examples += batch.len();
            summary.example_shape = batch.shape.dims()[1..].to_vec();
            summary.paired |= batch.partners.is_some();
            for &label in &batch.labels {
                *summary.label_counts.entry(label).or_insert(0) += 1;
            }
            let pixels = batch
                .images
                .iter()
                .chain(batch.partners.iter().flatten());
            for &v in pixels {
                summary.pixel_min = summary.pixel_min.min(v);
                summary.pixel_max = summary.pixel_max.max(v);
            }
        }

        if summary.examples == 0 {
            summary.pixel_min = 0.0;
            summary.pixel_max = 0.0;
        }
        Ok(summary)
    }

    /// Summaries of every loader in `loaders`, in train/valid/test/adversarial order.
    pub fn collect_all(loaders: &mut Loaders) -> Result<Vec<Self>> {
        let mut out = vec![Self::collect("train", &mut loaders.train)?];
        if let Some(valid) = loaders.valid.as_mut() {
            out.push(Self::collect("valid", valid)?);
        }
        out.push(Self::collect("test", &mut loaders.test)?);
        if let Some(adversarial) = loaders.adversarial_test.as_mut() {
            out.push(Self::collect("adversarial_test", adversarial)?);
        }
        Ok(out)
    }
}

impl fmt::Display for LoaderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>6} examples in {:>4} batches, example shape {:?}, pixels [{:.3}, {:.3}]",
            self.name,
            self.examples,
            self.batches,
            self.example_shape,
            self.pixel_min,
            self.pixel_max
        )?;
        if self.paired {
            write!(f, ", paired")?;
        }
        let counts: Vec<String> = self
            .label_counts
            .iter()
            .map(|(label, n)| format!("{label}:{n}"))
            .collect();
        write!(f, "\n{:<16} labels {}", "", counts.join(" "))
    }
}
