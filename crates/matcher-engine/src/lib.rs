//! # matcher-engine
//!
//! Query-time matching for the image matcher.
//!
//! A [`MatchEngine`] pairs a feature extractor with an index built by the
//! same strategy, searches the index for a query image and collapses
//! image-level candidates into a ranked product list. [`MatchService`]
//! keeps the live engine and swaps in freshly built indexes atomically.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod service;

pub use aggregate::aggregate;
pub use engine::MatchEngine;
pub use error::EngineError;
pub use service::MatchService;
