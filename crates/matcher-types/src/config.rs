//! Configuration loading for the image matcher.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Config file lives at ~/.config/image-matcher/config.{toml,json,yaml}.
//! Settings are read once when a match engine is constructed.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MatcherError;

/// Prefix of environment variable overrides
const ENV_PREFIX: &str = "MATCHER";

/// Feature extraction strategy used for both indexing and querying.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStrategy {
    /// Pretrained image encoder + inner-product search (higher fidelity)
    #[default]
    Embedding,
    /// Perceptual hash + Hamming scan (low memory)
    Hash,
}

impl std::fmt::Display for FeatureStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureStrategy::Embedding => write!(f, "embedding"),
            FeatureStrategy::Hash => write!(f, "hash"),
        }
    }
}

impl std::str::FromStr for FeatureStrategy {
    type Err = MatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" | "clip" => Ok(FeatureStrategy::Embedding),
            "hash" | "phash" => Ok(FeatureStrategy::Hash),
            other => Err(MatcherError::Config(format!(
                "unknown feature strategy: {other}"
            ))),
        }
    }
}

/// Image encoder identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Encoder architecture (e.g., "ViT-B-32")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Pretrained weights repository on HuggingFace Hub
    #[serde(default = "default_embedding_pretrained")]
    pub pretrained: String,

    /// Weights revision (branch, tag or commit)
    #[serde(default = "default_embedding_revision")]
    pub revision: String,

    /// Model cache directory (None = platform cache dir)
    #[serde(default)]
    pub cache_dir: Option<String>,
}

fn default_embedding_model() -> String {
    "ViT-B-32".to_string()
}

fn default_embedding_pretrained() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

fn default_embedding_revision() -> String {
    "refs/pr/15".to_string()
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            pretrained: default_embedding_pretrained(),
            revision: default_embedding_revision(),
            cache_dir: None,
        }
    }
}

/// Catalog image download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Per-request timeout (ms). A fetch exceeding it is skipped.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_ms: u64,

    /// Maximum concurrent image downloads during a build
    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,

    /// Retries per image after the first attempt
    #[serde(default)]
    pub retries: u32,
}

fn default_fetch_timeout() -> u64 {
    4000
}

fn default_fetch_concurrency() -> usize {
    8
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout(),
            concurrency: default_fetch_concurrency(),
            retries: 0,
        }
    }
}

/// Main matcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Feature strategy (embedding or hash)
    #[serde(default)]
    pub backend: FeatureStrategy,

    /// Global cap on indexed catalog images
    #[serde(default = "default_max_catalog_images")]
    pub max_catalog_images: usize,

    /// Cap on indexed images per product
    #[serde(default = "default_max_images_per_product")]
    pub max_images_per_product: usize,

    /// Perceptual hash side length (hash has hash_size² bits)
    #[serde(default = "default_hash_size")]
    pub hash_size: u32,

    /// Image encoder identity
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Image download settings
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Path to the cached catalog file
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Number of products returned per query
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_catalog_images() -> usize {
    24
}

fn default_max_images_per_product() -> usize {
    1
}

fn default_hash_size() -> u32 {
    8
}

fn default_catalog_path() -> String {
    "./cache/catalog.json".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: FeatureStrategy::default(),
            max_catalog_images: default_max_catalog_images(),
            max_images_per_product: default_max_images_per_product(),
            hash_size: default_hash_size(),
            embedding: EmbeddingSettings::default(),
            fetch: FetchSettings::default(),
            catalog_path: default_catalog_path(),
            default_top_k: default_top_k(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/image-matcher/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MATCHER_*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, MatcherError> {
        let config_dir = ProjectDirs::from("", "", "image-matcher")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::load_layered(&config_dir, cli_config_path, ENV_PREFIX)
    }

    fn load_layered(
        config_dir: &Path,
        cli_config_path: Option<&str>,
        env_prefix: &str,
    ) -> Result<Self, MatcherError> {
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("backend", FeatureStrategy::default().to_string())
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("max_catalog_images", default_max_catalog_images() as i64)
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default(
                "max_images_per_product",
                default_max_images_per_product() as i64,
            )
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("hash_size", default_hash_size() as i64)
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("embedding.model", default_embedding_model())
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("embedding.pretrained", default_embedding_pretrained())
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("fetch.timeout_ms", default_fetch_timeout() as i64)
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("catalog_path", default_catalog_path())
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MATCHER_MAX_CATALOG_IMAGES, MATCHER_FETCH__TIMEOUT_MS, ...
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| MatcherError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| MatcherError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), MatcherError> {
        if self.max_catalog_images < 1 {
            return Err(MatcherError::Config(
                "max_catalog_images must be >= 1".to_string(),
            ));
        }
        if self.max_images_per_product < 1 {
            return Err(MatcherError::Config(
                "max_images_per_product must be >= 1".to_string(),
            ));
        }
        if !(4..=64).contains(&self.hash_size) {
            return Err(MatcherError::Config(format!(
                "hash_size must be between 4 and 64, got {}",
                self.hash_size
            )));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(MatcherError::Config("fetch.timeout_ms must be > 0".to_string()));
        }
        if self.fetch.concurrency == 0 {
            return Err(MatcherError::Config(
                "fetch.concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Catalog path with a leading `~/` expanded to the home directory
    pub fn expanded_catalog_path(&self) -> PathBuf {
        if let Some(rest) = self.catalog_path.strip_prefix("~/") {
            if let Some(base) = directories::BaseDirs::new() {
                return base.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.catalog_path)
    }
}
