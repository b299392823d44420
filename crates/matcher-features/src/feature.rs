//! Feature strategies.
//!
//! A closed set of two strategies shares one contract: decode an image into
//! a comparable [`Feature`]. The embedding strategy wraps a shared encoder
//! service; the hash strategy is a cheap in-process computation.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use tracing::info;

use matcher_types::{FeatureStrategy, Settings};

use crate::cache::{default_cache_dir, ModelCache};
use crate::clip::ClipEncoder;
use crate::error::FeatureError;
use crate::model::{Embedding, ImageEncoder};
use crate::phash::{PerceptualHash, PerceptualHasher};

/// Which strategy produced a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Embedding,
    Hash,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Embedding => write!(f, "embedding"),
            FeatureKind::Hash => write!(f, "hash"),
        }
    }
}

impl From<FeatureStrategy> for FeatureKind {
    fn from(strategy: FeatureStrategy) -> Self {
        match strategy {
            FeatureStrategy::Embedding => FeatureKind::Embedding,
            FeatureStrategy::Hash => FeatureKind::Hash,
        }
    }
}

/// A comparable image fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    /// Unit-normalized embedding vector
    Embedding(Embedding),
    /// Fixed-length perceptual hash
    Hash(PerceptualHash),
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Embedding(_) => FeatureKind::Embedding,
            Feature::Hash(_) => FeatureKind::Hash,
        }
    }

    pub fn as_embedding(&self) -> Option<&Embedding> {
        match self {
            Feature::Embedding(e) => Some(e),
            Feature::Hash(_) => None,
        }
    }

    pub fn as_hash(&self) -> Option<&PerceptualHash> {
        match self {
            Feature::Hash(h) => Some(h),
            Feature::Embedding(_) => None,
        }
    }
}

/// Feature extractor for one strategy.
///
/// Cloning is cheap; the encoder is shared.
#[derive(Clone)]
pub enum FeatureExtractor {
    Embedding(Arc<dyn ImageEncoder>),
    Hash(PerceptualHasher),
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureExtractor::Embedding(encoder) => f
                .debug_struct("Embedding")
                .field("encoder", &encoder.info())
                .finish(),
            FeatureExtractor::Hash(hasher) => f
                .debug_struct("Hash")
                .field("hash_size", &hasher.hash_size())
                .finish(),
        }
    }
}

impl FeatureExtractor {
    /// Wrap a loaded encoder.
    pub fn embedding(encoder: Arc<dyn ImageEncoder>) -> Self {
        FeatureExtractor::Embedding(encoder)
    }

    /// Hash extractor with `hash_size²`-bit hashes.
    pub fn hash(hash_size: u32) -> Result<Self, FeatureError> {
        Ok(FeatureExtractor::Hash(PerceptualHasher::new(hash_size)?))
    }

    /// Build the extractor selected by settings.
    ///
    /// For the embedding strategy this loads the encoder (downloading weights
    /// on first use), which is slow and blocking.
    pub fn from_settings(settings: &Settings) -> Result<Self, FeatureError> {
        match settings.backend {
            FeatureStrategy::Hash => Self::hash(settings.hash_size),
            FeatureStrategy::Embedding => {
                let cache = model_cache(settings);
                let encoder = ClipEncoder::load(&cache, &settings.embedding.model)?;
                info!(
                    model = %settings.embedding.model,
                    pretrained = %settings.embedding.pretrained,
                    "Embedding extractor ready"
                );
                Ok(Self::embedding(Arc::new(encoder)))
            }
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureExtractor::Embedding(_) => FeatureKind::Embedding,
            FeatureExtractor::Hash(_) => FeatureKind::Hash,
        }
    }

    /// Length of the features this extractor produces: the encoder's vector
    /// dimension, or the hash bit length.
    pub fn dimension(&self) -> usize {
        match self {
            FeatureExtractor::Embedding(encoder) => encoder.info().dimension,
            FeatureExtractor::Hash(hasher) => hasher.bit_len(),
        }
    }

    /// Short human-readable identity, e.g. `embedding:ViT-B-32/512` or `hash:8x8`.
    pub fn describe(&self) -> String {
        match self {
            FeatureExtractor::Embedding(encoder) => {
                let info = encoder.info();
                format!("embedding:{}/{}", info.name, info.dimension)
            }
            FeatureExtractor::Hash(hasher) => {
                format!("hash:{}x{}", hasher.hash_size(), hasher.hash_size())
            }
        }
    }

    /// Extract the feature for one image.
    pub fn extract(&self, image: &DynamicImage) -> Result<Feature, FeatureError> {
        match self {
            FeatureExtractor::Embedding(encoder) => encoder.embed(image).map(Feature::Embedding),
            FeatureExtractor::Hash(hasher) => Ok(Feature::Hash(hasher.hash(image))),
        }
    }

    /// Extract features for several images; same per-image output as `extract`.
    pub fn extract_batch(&self, images: &[&DynamicImage]) -> Result<Vec<Feature>, FeatureError> {
        match self {
            FeatureExtractor::Embedding(encoder) => Ok(encoder
                .embed_batch(images)?
                .into_iter()
                .map(Feature::Embedding)
                .collect()),
            FeatureExtractor::Hash(hasher) => Ok(images
                .iter()
                .map(|image| Feature::Hash(hasher.hash(image)))
                .collect()),
        }
    }
}

/// Model cache described by settings.
pub fn model_cache(settings: &Settings) -> ModelCache {
    let cache_dir = settings
        .embedding
        .cache_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_dir);
    ModelCache::new(cache_dir, settings.embedding.pretrained.clone())
        .with_revision(settings.embedding.revision.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncoderInfo;
    use image::{Rgb, RgbImage};

    /// Encodes the mean color of an image.
    struct MeanColorEncoder {
        info: EncoderInfo,
    }

    impl MeanColorEncoder {
        fn new() -> Self {
            Self {
                info: EncoderInfo {
                    name: "mean-color".to_string(),
                    pretrained: "none".to_string(),
                    dimension: 3,
                    image_size: 0,
                },
            }
        }
    }

    impl ImageEncoder for MeanColorEncoder {
        fn info(&self) -> &EncoderInfo {
            &self.info
        }

        fn embed(&self, image: &DynamicImage) -> Result<Embedding, FeatureError> {
            let rgb = image.to_rgb8();
            let mut sum = [0f32; 3];
            for p in rgb.pixels() {
                for c in 0..3 {
                    sum[c] += p[c] as f32;
                }
            }
            Ok(Embedding::new(sum.to_vec()))
        }
    }

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([r, g, b])))
    }

    #[test]
    fn test_kinds() {
        let hash = FeatureExtractor::hash(8).unwrap();
        assert_eq!(hash.kind(), FeatureKind::Hash);
        assert_eq!(hash.describe(), "hash:8x8");

        let emb = FeatureExtractor::embedding(Arc::new(MeanColorEncoder::new()));
        assert_eq!(emb.kind(), FeatureKind::Embedding);
        assert_eq!(emb.describe(), "embedding:mean-color/3");
    }

    #[test]
    fn test_dimension_matches_extracted_features() {
        let hash = FeatureExtractor::hash(16).unwrap();
        assert_eq!(hash.dimension(), 256);
        let feature = hash.extract(&solid(10, 20, 30)).unwrap();
        assert_eq!(feature.as_hash().unwrap().len(), 256);

        let emb = FeatureExtractor::embedding(Arc::new(MeanColorEncoder::new()));
        assert_eq!(emb.dimension(), 3);
        let feature = emb.extract(&solid(10, 20, 30)).unwrap();
        assert_eq!(feature.as_embedding().unwrap().dimension(), 3);
    }

    #[test]
    fn test_hash_extractor_rejects_small_size() {
        assert!(FeatureExtractor::hash(2).is_err());
    }

    #[test]
    fn test_extract_embedding_is_normalized() {
        let extractor = FeatureExtractor::embedding(Arc::new(MeanColorEncoder::new()));
        let feature = extractor.extract(&solid(200, 10, 90)).unwrap();
        assert_eq!(feature.kind(), FeatureKind::Embedding);
        let emb = feature.as_embedding().unwrap();
        assert!((emb.norm() - 1.0).abs() < 1e-5);
        assert!(feature.as_hash().is_none());
    }

    #[test]
    fn test_batch_matches_single() {
        let images = [solid(1, 2, 3), solid(250, 0, 0), solid(9, 9, 200)];
        let refs: Vec<&DynamicImage> = images.iter().collect();

        for extractor in [
            FeatureExtractor::embedding(Arc::new(MeanColorEncoder::new())),
            FeatureExtractor::hash(8).unwrap(),
        ] {
            let batch = extractor.extract_batch(&refs).unwrap();
            for (image, feature) in images.iter().zip(batch.iter()) {
                assert_eq!(&extractor.extract(image).unwrap(), feature);
            }
        }
    }

    #[test]
    fn test_from_settings_hash_needs_no_model() {
        let mut settings = Settings::default();
        settings.backend = FeatureStrategy::Hash;
        settings.hash_size = 16;
        let extractor = FeatureExtractor::from_settings(&settings).unwrap();
        assert_eq!(extractor.describe(), "hash:16x16");
    }

    #[test]
    fn test_from_settings_unknown_model_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.embedding.model = "RN50x64".to_string();
        settings.embedding.cache_dir = Some(temp.path().to_string_lossy().to_string());
        assert!(matches!(
            FeatureExtractor::from_settings(&settings),
            Err(FeatureError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_model_cache_from_settings() {
        let mut settings = Settings::default();
        settings.embedding.cache_dir = Some("/tmp/models".to_string());
        let cache = model_cache(&settings);
        assert_eq!(cache.cache_dir, PathBuf::from("/tmp/models"));
        assert_eq!(cache.repo_id, settings.embedding.pretrained);
    }
}
