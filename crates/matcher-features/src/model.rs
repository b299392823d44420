//! Image encoder trait and embedding type.
//!
//! Defines the interface for turning decoded images into embedding vectors.

use image::DynamicImage;

use crate::error::FeatureError;

/// Vector embedding - a normalized float array.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The embedding vector (normalized to unit length)
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector.
    /// Normalizes the vector to unit length.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            values.iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    /// Create embedding without normalization (for pre-normalized vectors)
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// L2 norm of the vector (1.0 for anything built with [`Embedding::new`])
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Compute cosine similarity with another embedding.
    /// Returns value in [-1, 1] range (1 = identical).
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        // Both are normalized, so the dot product is the cosine
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Encoder information
#[derive(Debug, Clone)]
pub struct EncoderInfo {
    /// Architecture name (e.g., "ViT-B-32")
    pub name: String,
    /// Pretrained weights identity (e.g., HuggingFace repo id)
    pub pretrained: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Square input resolution in pixels
    pub image_size: usize,
}

/// Trait for image encoders.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
/// Every returned embedding is unit-normalized.
pub trait ImageEncoder: Send + Sync {
    /// Get encoder information
    fn info(&self) -> &EncoderInfo;

    /// Generate embedding for a single image.
    fn embed(&self, image: &DynamicImage) -> Result<Embedding, FeatureError>;

    /// Generate embeddings for multiple images (batch).
    /// Must agree with `embed` image by image.
    fn embed_batch(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>, FeatureError> {
        images.iter().map(|image| self.embed(image)).collect()
    }
}
