use std::fmt;

// Shape: dimensions of an image or a batch of images
//
// Images are always channel-first:
//   - Grayscale 28×28:  Shape([1, 28, 28])
//   - RGB 32×32:        Shape([3, 32, 32])
//   - A batch of 50:    Shape([50, 1, 28, 28])
//
// Pixel buffers are flat, row-major within each channel plane, planes stored
// one after another.

/// N-dimensional shape of an image or batch buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// A channel-first image shape `[c, h, w]`.
    pub fn image(channels: usize, height: usize, width: usize) -> Self {
        Shape(vec![channels, height, width])
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A rank-0 shape has 1 element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or(crate::Error::DimOutOfRange {
            dim: d,
            rank: self.rank(),
        })
    }

    /// Channel count of a `[C, H, W]` image shape.
    pub fn channels(&self) -> crate::Result<usize> {
        self.expect_image()?;
        Ok(self.0[0])
    }

    /// Height of a `[C, H, W]` image shape.
    pub fn height(&self) -> crate::Result<usize> {
        self.expect_image()?;
        Ok(self.0[1])
    }

    /// Width of a `[C, H, W]` image shape.
    pub fn width(&self) -> crate::Result<usize> {
        self.expect_image()?;
        Ok(self.0[2])
    }

    /// Prepend a batch dimension: `[C, H, W]` → `[n, C, H, W]`.
    pub fn batched(&self, n: usize) -> Shape {
        let mut dims = Vec::with_capacity(self.rank() + 1);
        dims.push(n);
        dims.extend_from_slice(&self.0);
        Shape(dims)
    }

    fn expect_image(&self) -> crate::Result<()> {
        if self.rank() != 3 {
            return Err(crate::Error::RankMismatch {
                expected: 3,
                got: self.rank(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// Convenient From implementations
// These let you write: Shape::from((1, 28, 28)) instead of Shape::new(vec![1, 28, 28])

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_shape() {
        let s = Shape::image(1, 28, 28);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.elem_count(), 784);
        assert_eq!(s.channels().unwrap(), 1);
        assert_eq!(s.height().unwrap(), 28);
        assert_eq!(s.width().unwrap(), 28);
    }

    #[test]
    fn test_batched() {
        let s = Shape::from((3, 32, 32)).batched(50);
        assert_eq!(s.dims(), &[50, 3, 32, 32]);
        assert_eq!(s.elem_count(), 50 * 3 * 32 * 32);
    }

    #[test]
    fn test_image_accessors_need_rank_3() {
        let s = Shape::from((28, 28));
        assert!(matches!(
            s.channels(),
            Err(crate::Error::RankMismatch {
                expected: 3,
                got: 2
            })
        ));
    }

    #[test]
    fn test_dim_out_of_range() {
        let s = Shape::from(5);
        assert_eq!(s.dim(0).unwrap(), 5);
        assert!(s.dim(1).is_err());
    }

    #[test]
    fn test_display() {
        let s = Shape::from((1, 28, 28));
        assert_eq!(format!("{}", s), "[1, 28, 28]");
    }
}
