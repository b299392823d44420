//! Index and fetch error types.

use thiserror::Error;

use matcher_features::FeatureError;

/// Errors from downloading a single catalog image.
///
/// During a build these are never fatal; the image is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Server answered with a non-success status
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("Request failed: {0}")]
    Request(String),

    /// Body is not a decodable image
    #[error("Decode failed: {0}")]
    Decode(#[from] FeatureError),
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Request(_) => true,
            FetchError::Http { status } => *status == 429 || *status >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Errors that can occur while building or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Build parameters out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Build was cancelled before completion
    #[error("Index build cancelled")]
    Cancelled,

    /// Query feature does not match the indexed feature layout
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Query feature kind differs from the index
    #[error("Feature kind mismatch: index holds {expected}, query is {actual}")]
    KindMismatch { expected: String, actual: String },

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Feature extraction error
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Blocking extraction task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
