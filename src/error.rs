use thiserror::Error;

/// Errors raised by the model, split and metric layers.
///
/// File-system heavy code (loading, saving, the pipeline driver) works with
/// `anyhow` instead and wraps these with context.
#[derive(Debug, Error)]
pub enum Error {
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error(
        "input shape {height}x{width}x{channels} is incompatible with VGG16 \
         (needs 3 channels and at least {min_side}x{min_side} pixels)"
    )]
    InputShape {
        height: usize,
        width: usize,
        channels: usize,
        min_side: usize,
    },

    #[error("labels ({labels}) and predictions ({predictions}) differ in length")]
    LengthMismatch { labels: usize, predictions: usize },

    #[error("splitting {samples} samples with test fraction {fraction} leaves an empty partition")]
    EmptyPartition { samples: usize, fraction: f64 },

    #[error("split fraction {0} must lie strictly between 0 and 1")]
    InvalidFraction(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
