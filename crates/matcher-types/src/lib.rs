//! # matcher-types
//!
//! Shared domain types for the image matcher.
//!
//! This crate defines the data structures passed between the matcher crates:
//! - Products: catalog records as loaded from a catalog file
//! - Match results: per-product scores returned to callers
//! - Settings: layered configuration for the matching engine
//!
//! ## Usage
//!
//! ```rust
//! use matcher_types::{MatchResult, Product};
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod matching;

pub use catalog::{load_catalog, save_catalog, Product};
pub use config::{FeatureStrategy, Settings};
pub use error::MatcherError;
pub use matching::MatchResult;
