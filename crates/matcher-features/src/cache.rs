//! Model file caching.
//!
//! Downloads and caches encoder weights from HuggingFace Hub.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::FeatureError;

/// Default pretrained weights repository on HuggingFace
pub const DEFAULT_MODEL_REPO: &str = "openai/clip-vit-base-patch32";

/// Default weights revision; the first revision of the repo with safetensors
pub const DEFAULT_REVISION: &str = "refs/pr/15";

/// Required model files
pub const MODEL_FILES: &[&str] = &["model.safetensors"];

/// Model cache configuration
#[derive(Debug, Clone)]
pub struct ModelCache {
    /// Cache directory path
    pub cache_dir: PathBuf,
    /// Model repository ID
    pub repo_id: String,
    /// Repository revision
    pub revision: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            repo_id: DEFAULT_MODEL_REPO.to_string(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }
}

/// Platform cache directory for encoder weights
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("image-matcher")
        .join("models")
}

impl ModelCache {
    /// Create a new model cache with custom settings
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Get the model directory path
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir
            .join(self.repo_id.replace('/', "_"))
            .join(self.revision.replace('/', "_"))
    }

    /// Check if all model files are cached
    pub fn is_cached(&self) -> bool {
        let model_dir = self.model_dir();
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    /// Get path to a specific model file
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }
}

/// Paths to model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub weights: PathBuf,
}

/// Get or download model files.
///
/// Returns the path to model.safetensors.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, FeatureError> {
    let model_dir = cache.model_dir();

    if cache.is_cached() {
        debug!(path = ?model_dir, "Using cached model");
    } else {
        info!(repo = %cache.repo_id, revision = %cache.revision, "Downloading model files...");
        download_model_files(cache)?;
    }

    Ok(ModelPaths {
        weights: model_dir.join("model.safetensors"),
    })
}

/// Download model files from HuggingFace Hub
fn download_model_files(cache: &ModelCache) -> Result<(), FeatureError> {
    use hf_hub::api::sync::Api;
    use hf_hub::{Repo, RepoType};

    let api = Api::new().map_err(|e| FeatureError::Download(e.to_string()))?;
    let repo = api.repo(Repo::with_revision(
        cache.repo_id.clone(),
        RepoType::Model,
        cache.revision.clone(),
    ));

    std::fs::create_dir_all(cache.model_dir())?;

    for filename in MODEL_FILES {
        info!(file = filename, "Downloading...");
        let source_path = repo
            .get(filename)
            .map_err(|e| FeatureError::Download(format!("{}: {}", filename, e)))?;

        let dest_path = cache.file_path(filename);
        std::fs::copy(&source_path, &dest_path)?;
        debug!(file = filename, "Downloaded to {:?}", dest_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_default() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("image-matcher"));
        assert_eq!(cache.repo_id, DEFAULT_MODEL_REPO);
        assert_eq!(cache.revision, DEFAULT_REVISION);
    }

    #[test]
    fn test_is_cached_empty() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert!(!cache.is_cached());
    }

    #[test]
    fn test_is_cached_after_files_present() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model").with_revision("refs/pr/1");
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(cache.file_path("model.safetensors"), b"stub").unwrap();

        assert!(cache.is_cached());
        assert!(cache.model_dir().ends_with("refs_pr_1"));
    }
}
