//! # matcher-features
//!
//! Image feature extraction for the image matcher.
//!
//! Two interchangeable strategies turn a decoded image into something that
//! can be compared against the catalog:
//! - Embeddings from a frozen CLIP ViT-B/32 vision tower, run locally via Candle
//! - DCT perceptual hashes compared by Hamming distance
//!
//! ## Features
//! - Local inference via Candle (no Python, no API)
//! - Automatic weight caching from HuggingFace Hub
//! - Batch embedding for index builds
//! - Metadata-free RGB decoding of uploads and fetched catalog images

pub mod cache;
pub mod clip;
pub mod error;
pub mod feature;
pub mod image_io;
pub mod model;
pub mod phash;

pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use clip::{ClipEncoder, EMBEDDING_DIM};
pub use error::FeatureError;
pub use feature::{model_cache, Feature, FeatureExtractor, FeatureKind};
pub use image_io::{decode_image, is_image_path, load_image, IMAGE_EXTENSIONS};
pub use model::{Embedding, EncoderInfo, ImageEncoder};
pub use phash::{PerceptualHash, PerceptualHasher, MAX_HASH_SIZE, MIN_HASH_SIZE};
