//! Feature extraction error types.

use thiserror::Error;

/// Errors that can occur during feature extraction.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Image decode or resize error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Encoder architecture not supported
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed perceptual hash
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
