//! Match engine error types.

use thiserror::Error;

use matcher_features::{FeatureError, FeatureKind};
use matcher_index::IndexError;
use matcher_types::MatcherError;

/// Errors that can occur while constructing or querying a match engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Extractor and index were built with different strategies or layouts
    #[error(
        "Strategy mismatch: extractor produces {extractor}/{extractor_dimension} features, \
         index holds {index}/{index_dimension}"
    )]
    StrategyMismatch {
        extractor: FeatureKind,
        extractor_dimension: usize,
        index: FeatureKind,
        index_dimension: usize,
    },

    /// Query image could not be decoded or encoded
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Index build or search failed
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Catalog or settings error
    #[error("Catalog error: {0}")]
    Catalog(#[from] MatcherError),

    /// Blocking task panicked or was aborted
    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
