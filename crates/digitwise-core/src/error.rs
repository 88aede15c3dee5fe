use std::path::PathBuf;

use crate::shape::Shape;

/// All errors that can occur within digitwise.
///
/// Decoding failures, download failures, selection failures that have no
/// meaningful result, and batching shape errors share this one enum so they
/// propagate with `?` from the file readers all the way up to the loader
/// entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying filesystem or stream error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataset file that should exist on disk was not found.
    #[error("dataset file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// File header carries the wrong magic number.
    #[error("invalid magic: expected {expected:#06x}, got {got:#06x}")]
    InvalidMagic { expected: u32, got: u32 },

    /// File shorter than its header claims.
    #[error("{what} truncated: expected {expected} bytes, got {got}")]
    Truncated {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Image and label files disagree on the number of examples.
    #[error("count mismatch: {images} images vs {labels} labels")]
    CountMismatch { images: usize, labels: usize },

    /// Fetching a dataset file over the network failed.
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Shape mismatch between two buffers (e.g. collating [1,28,28] with [3,32,32]).
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// Dimension index out of range for the shape's rank.
    #[error("dimension out of range: dim {dim} for shape with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// A label subset names the same label twice.
    #[error("label {label} appears more than once in the label subset")]
    DuplicateLabel { label: usize },

    /// Retargeting needs at least two classes.
    #[error("cannot draw a different label with only {classes} class(es)")]
    NoAlternativeLabel { classes: usize },

    /// Every example carries the same label, so no partner can differ.
    #[error("no example with a label other than {label} to pair with")]
    NoPartner { label: usize },

    /// Split lengths do not add up to the dataset size.
    #[error("split lengths sum to {expected}, dataset has {total} examples")]
    SplitLengths { total: usize, expected: usize },

    /// Worker pool could not be created.
    #[error("worker pool: {0}")]
    ThreadPool(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout digitwise.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::InvalidMagic {
            expected: 2051,
            got: 7,
        };
        assert_eq!(e.to_string(), "invalid magic: expected 0x0803, got 0x0007");

        let e = Error::ShapeMismatch {
            expected: Shape::image(1, 28, 28),
            got: Shape::image(3, 32, 32),
        };
        assert_eq!(
            e.to_string(),
            "shape mismatch: expected [1, 28, 28], got [3, 32, 32]"
        );
    }

    #[test]
    fn test_bail() {
        fn fails(n: usize) -> Result<()> {
            if n > 2 {
                crate::bail!("too many: {}", n);
            }
            Ok(())
        }
        assert!(fails(1).is_ok());
        assert_eq!(fails(3).unwrap_err().to_string(), "too many: 3");
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
