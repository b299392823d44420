//! # matcher-index
//!
//! Catalog indexing and similarity search for the image matcher.
//!
//! The index is an in-memory artifact rebuilt from the catalog on demand:
//! catalog images are fetched over HTTP, turned into features, and stored
//! in catalog order next to a similarity backend.
//!
//! ## Features
//! - Bounded, order-preserving concurrent image downloads with timeouts
//! - Per-image skip on fetch, decode or extraction failure
//! - Global and per-product image caps
//! - Exact inner-product search for embeddings, Hamming scan for hashes
//! - Cancellable builds

pub mod backend;
pub mod builder;
pub mod error;
pub mod fetch;
pub mod index;

pub use backend::{hamming_score, FlatIpIndex, HammingIndex, SearchResult, SimilarityBackend};
pub use builder::{BuildConfig, BuildStats, CatalogIndexBuilder, SkipReason, SkippedImage};
pub use error::{FetchError, IndexError};
pub use fetch::{FetchConfig, HttpImageFetcher, ImageFetcher};
pub use index::{CatalogIndex, IndexStats, IndexedImage};
pub use tokio_util::sync::CancellationToken;
