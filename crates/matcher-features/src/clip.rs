//! Candle-based CLIP image encoder.
//!
//! Uses the ViT-B/32 vision tower and projection for 512-dimensional
//! image embeddings. candle's CLIP towers use QuickGELU, so only weights
//! trained with QuickGELU (the OpenAI releases) reproduce the pretrained
//! model.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::FeatureError;
use crate::model::{Embedding, EncoderInfo, ImageEncoder};

/// Embedding dimension for ViT-B/32
pub const EMBEDDING_DIM: usize = 512;

/// Input resolution expected by the vision tower
pub const CLIP_IMAGE_SIZE: usize = 224;

/// Default batch size for embedding
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Per-channel normalization used during CLIP pretraining
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Resolve an architecture name to its candle config and output dimension.
fn architecture(model_name: &str) -> Result<(ClipConfig, usize), FeatureError> {
    match model_name.trim().to_ascii_lowercase().as_str() {
        "vit-b-32" | "vit-b/32" | "vit_base_patch32" => {
            Ok((ClipConfig::vit_base_patch32(), EMBEDDING_DIM))
        }
        _ => Err(FeatureError::UnsupportedModel(model_name.to_string())),
    }
}

/// Weight families trained with standard GELU, which candle cannot run.
const GELU_WEIGHT_PREFIXES: &[&str] = &["laion/", "timm/"];

/// Reject pretrained weights whose activation differs from candle's towers.
fn check_pretrained(pretrained: &str) -> Result<(), FeatureError> {
    let lower = pretrained.trim().to_ascii_lowercase();
    if GELU_WEIGHT_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Err(FeatureError::UnsupportedModel(format!(
            "{pretrained}: weights trained with GELU, encoder runs QuickGELU"
        )));
    }
    Ok(())
}

/// Resize the shortest side to `size` (bicubic) and center-crop to a square.
fn resize_center_crop(image: &DynamicImage, size: u32) -> RgbImage {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let scale = size as f64 / width.min(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(size);
    let new_height = ((height as f64 * scale).round() as u32).max(size);

    let resized = image
        .resize_exact(new_width, new_height, FilterType::CatmullRom)
        .to_rgb8();
    let x = (new_width - size) / 2;
    let y = (new_height - size) / 2;
    imageops::crop_imm(&resized, x, y, size, size).to_image()
}

/// CLIP image encoder.
///
/// Frozen weights, loaded once and shared behind an `Arc`.
pub struct ClipEncoder {
    model: ClipModel,
    device: Device,
    info: EncoderInfo,
}

impl ClipEncoder {
    /// Load the encoder from cache (downloading if needed).
    ///
    /// The architecture is checked before any download happens.
    pub fn load(cache: &ModelCache, model_name: &str) -> Result<Self, FeatureError> {
        architecture(model_name)?;
        check_pretrained(&cache.repo_id)?;
        let paths = get_or_download_model(cache)?;
        Self::load_from_path(&paths.weights, model_name, &cache.repo_id)
    }

    /// Load ViT-B-32 with default cache settings
    pub fn load_default() -> Result<Self, FeatureError> {
        let cache = ModelCache::default();
        Self::load(&cache, "ViT-B-32")
    }

    /// Load from an explicit safetensors file
    pub fn load_from_path(
        weights_path: &std::path::Path,
        model_name: &str,
        pretrained: &str,
    ) -> Result<Self, FeatureError> {
        let (config, dimension) = architecture(model_name)?;
        check_pretrained(pretrained)?;

        if !weights_path.exists() {
            return Err(FeatureError::ModelNotFound(
                weights_path.display().to_string(),
            ));
        }

        info!(model = model_name, pretrained, "Loading image encoder...");

        // CPU only for now
        let device = Device::Cpu;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = ClipModel::new(vb, &config)?;

        info!(
            dim = dimension,
            image_size = CLIP_IMAGE_SIZE,
            "Encoder loaded successfully"
        );

        Ok(Self {
            model,
            device,
            info: EncoderInfo {
                name: model_name.to_string(),
                pretrained: pretrained.to_string(),
                dimension,
                image_size: CLIP_IMAGE_SIZE,
            },
        })
    }

    /// Resize, crop, normalize and lay out one image as a (3, H, W) tensor.
    fn preprocess(&self, image: &DynamicImage) -> Result<Tensor, FeatureError> {
        let size = CLIP_IMAGE_SIZE;
        let rgb = resize_center_crop(image, size as u32);

        let plane = size * size;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let idx = y as usize * size + x as usize;
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                data[c * plane + idx] = (v - CLIP_MEAN[c]) / CLIP_STD[c];
            }
        }

        Ok(Tensor::from_vec(data, (3, size, size), &self.device)?)
    }
}

impl ImageEncoder for ClipEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    fn embed(&self, image: &DynamicImage) -> Result<Embedding, FeatureError> {
        self.embed_batch(&[image])?
            .into_iter()
            .next()
            .ok_or_else(|| FeatureError::InvalidInput("encoder returned no output".to_string()))
    }

    fn embed_batch(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>, FeatureError> {
        if images.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = images.len(), "Embedding batch");

        let mut embeddings = Vec::with_capacity(images.len());
        for chunk in images.chunks(DEFAULT_BATCH_SIZE) {
            let pixels = chunk
                .iter()
                .map(|image| self.preprocess(image))
                .collect::<Result<Vec<_>, _>>()?;
            let pixels = Tensor::stack(&pixels, 0)?;

            // (batch, projection_dim)
            let features = self.model.get_image_features(&pixels)?;
            let rows: Vec<Vec<f32>> = features.to_vec2()?;

            for row in rows {
                if row.len() != self.info.dimension {
                    return Err(FeatureError::DimensionMismatch {
                        expected: self.info.dimension,
                        actual: row.len(),
                    });
                }
                embeddings.push(Embedding::new(row));
            }
        }

        debug!(
            count = embeddings.len(),
            dim = self.info.dimension,
            "Batch complete"
        );

        Ok(embeddings)
    }
}
