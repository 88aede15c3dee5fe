// Transform: preprocessing pipeline applied per sample
//
// Every transform touches the partner image exactly like the main image, so a
// pair always reaches the model with both halves preprocessed identically.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use digitwise_core::Shape;

use crate::dataset::Sample;

/// A transform applied to each sample before batching.
pub trait Transform: Send + Sync {
    /// Apply the transform to a sample, returning the modified sample.
    fn apply(&self, sample: Sample) -> Sample;
}

/// Apply `f` to the image and, when present, the partner image.
fn map_pixels(mut sample: Sample, f: impl Fn(f32) -> f32) -> Sample {
    for v in &mut sample.image {
        *v = f(*v);
    }
    if let Some(partner) = &mut sample.partner {
        for v in partner.iter_mut() {
            *v = f(*v);
        }
    }
    sample
}

// Built-in transforms

/// Resize so the smaller edge equals `size`, keeping the aspect ratio.
///
/// The longer edge becomes `size * long / short` (truncated). Each channel
/// plane is resampled with a bilinear (triangle) filter.
#[derive(Debug, Clone)]
pub struct Resize {
    size: usize,
}

impl Resize {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Output `(height, width)` for an input of `(height, width)`.
    pub fn target_dims(&self, height: usize, width: usize) -> (usize, usize) {
        if height <= width {
            (self.size, self.size * width / height.max(1))
        } else {
            (self.size * height / width.max(1), self.size)
        }
    }
}

/// Resample one `[C, H, W]` buffer to `[C, nh, nw]`.
fn resize_planes(
    data: &[f32],
    c: usize,
    (h, w): (usize, usize),
    (nh, nw): (usize, usize),
) -> Vec<f32> {
    let plane_len = h * w;
    let mut out = Vec::with_capacity(c * nh * nw);
    for ch in 0..c {
        let plane = &data[ch * plane_len..(ch + 1) * plane_len];

        // Float subpixels are clamped to [0, 1] by the resampler, so each plane
        // is mapped into that range and back. Triangle weights are non-negative,
        // which keeps the resampled values inside [lo, hi].
        let lo = plane.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = plane.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let span = if hi > lo { hi - lo } else { 1.0 };
        let unit: Vec<f32> = plane.iter().map(|&v| (v - lo) / span).collect();

        match ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w as u32, h as u32, unit) {
            Some(buf) => {
                let resized = imageops::resize(&buf, nw as u32, nh as u32, FilterType::Triangle);
                out.extend(resized.into_raw().into_iter().map(|v| v * span + lo));
            }
            // Only reachable with a sample whose buffer disagrees with its shape.
            None => out.extend(std::iter::repeat(0.0).take(nh * nw)),
        }
    }
    out
}

impl Transform for Resize {
    fn apply(&self, mut sample: Sample) -> Sample {
        let dims = sample.shape.dims();
        if dims.len() != 3 {
            return sample;
        }
        let (c, h, w) = (dims[0], dims[1], dims[2]);
        let (nh, nw) = self.target_dims(h, w);
        if (nh, nw) == (h, w) || nh == 0 || nw == 0 {
            return sample;
        }

        sample.image = resize_planes(&sample.image, c, (h, w), (nh, nw));
        if let Some(partner) = sample.partner.take() {
            sample.partner = Some(resize_planes(&partner, c, (h, w), (nh, nw)));
        }
        sample.shape = Shape::image(c, nh, nw);
        sample
    }
}

/// Divide pixel values by a given scale factor.
///
/// `Normalize::new(255.0)` turns raw pixels into the `[0, 1]` range.
#[derive(Debug, Clone)]
pub struct Normalize {
    scale: f32,
}

impl Normalize {
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }
}

impl Transform for Normalize {
    fn apply(&self, sample: Sample) -> Sample {
        let scale = self.scale;
        map_pixels(sample, |v| v / scale)
    }
}

/// Standardize pixels: `(x - mean) / std`.
#[derive(Debug, Clone)]
pub struct Standardize {
    pub mean: f32,
    pub std: f32,
}

impl Standardize {
    pub fn new(mean: f32, std: f32) -> Self {
        Self { mean, std }
    }
}

impl Transform for Standardize {
    fn apply(&self, sample: Sample) -> Sample {
        let (mean, std) = (self.mean, self.std);
        map_pixels(sample, |v| (v - mean) / std)
    }
}

/// Chain multiple transforms.
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }
}

impl Transform for Compose {
    fn apply(&self, mut sample: Sample) -> Sample {
        for t in &self.transforms {
            sample = t.apply(sample);
        }
        sample
    }
}

/// Resize, scale to `[0, 1]`, then standardize with mean 0.5 / std 0.5,
/// landing pixels in `[-1, 1]`.
pub fn standard_pipeline(img_size: usize) -> Compose {
    Compose::new(vec![
        Box::new(Resize::new(img_size)),
        Box::new(Normalize::new(255.0)),
        Box::new(Standardize::new(0.5, 0.5)),
    ])
}

/// Resize and scale to `[0, 1]`; pairs are not standardized.
pub fn pair_pipeline(img_size: usize) -> Compose {
    Compose::new(vec![
        Box::new(Resize::new(img_size)),
        Box::new(Normalize::new(255.0)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pixels: Vec<f32>, shape: Shape) -> Sample {
        Sample {
            image: pixels,
            shape,
            partner: None,
            label: 3,
        }
    }

    #[test]
    fn test_resize_target_dims_keeps_aspect() {
        let r = Resize::new(14);
        assert_eq!(r.target_dims(28, 28), (14, 14));
        assert_eq!(r.target_dims(28, 56), (14, 28));
        assert_eq!(r.target_dims(30, 20), (21, 14));
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let s = sample(vec![1.0, 2.0, 3.0, 4.0], Shape::image(1, 2, 2));
        let out = Resize::new(2).apply(s.clone());
        assert_eq!(out, s);
    }

    #[test]
    fn test_resize_constant_image_stays_constant() {
        let s = sample(vec![200.0; 3 * 8 * 8], Shape::image(3, 8, 8));
        let out = Resize::new(4).apply(s);
        assert_eq!(out.shape.dims(), &[3, 4, 4]);
        assert_eq!(out.image.len(), 3 * 16);
        for v in out.image {
            assert!((v - 200.0).abs() < 1e-3, "got {v}");
        }
    }

    #[test]
    fn test_resize_stays_within_input_range() {
        let pixels: Vec<f32> = (0..64).map(|i| (i * 4) as f32).collect();
        let s = sample(pixels, Shape::image(1, 8, 8));
        let out = Resize::new(16).apply(s);
        assert_eq!(out.shape.dims(), &[1, 16, 16]);
        for v in out.image {
            assert!((0.0..=252.0 + 1e-3).contains(&v), "got {v}");
        }
    }

    #[test]
    fn test_resize_applies_to_partner() {
        let mut s = sample(vec![10.0; 16], Shape::image(1, 4, 4));
        s.partner = Some(vec![90.0; 16]);
        let out = Resize::new(2).apply(s);
        let partner = out.partner.unwrap();
        assert_eq!(partner.len(), 4);
        assert!(partner.iter().all(|v| (v - 90.0).abs() < 1e-3));
    }

    #[test]
    fn test_normalize_then_standardize() {
        let s = sample(vec![0.0, 127.5, 255.0], Shape::image(1, 1, 3));
        let out = Standardize::new(0.5, 0.5).apply(Normalize::new(255.0).apply(s));
        assert!((out.image[0] + 1.0).abs() < 1e-6);
        assert!(out.image[1].abs() < 1e-6);
        assert!((out.image[2] - 1.0).abs() < 1e-6);
        // label untouched
        assert_eq!(out.label, 3);
    }

    #[test]
    fn test_standard_pipeline_range() {
        let pixels: Vec<f32> = (0..784).map(|i| (i % 256) as f32).collect();
        let out = standard_pipeline(28).apply(sample(pixels, Shape::image(1, 28, 28)));
        assert_eq!(out.shape.dims(), &[1, 28, 28]);
        assert!(out.image.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_pair_pipeline_scales_both_images() {
        let mut s = sample(vec![255.0; 4], Shape::image(1, 2, 2));
        s.partner = Some(vec![0.0; 4]);
        let out = pair_pipeline(2).apply(s);
        assert_eq!(out.image, vec![1.0; 4]);
        assert_eq!(out.partner, Some(vec![0.0; 4]));
    }
}
