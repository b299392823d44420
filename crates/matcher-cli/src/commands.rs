//! Command implementations for the image matcher CLI.
//!
//! Each command:
//! 1. Loads configuration (defaults -> file -> env -> CLI flags)
//! 2. Initializes logging
//! 3. Runs, printing JSON to stdout

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use matcher_engine::MatchService;
use matcher_features::{is_image_path, model_cache, FeatureExtractor};
use matcher_index::{BuildStats, IndexStats};
use matcher_types::{FeatureStrategy, MatchResult, Settings};

/// CLI overrides applied on top of loaded settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub catalog: Option<String>,
    pub backend: Option<String>,
    pub top_k: Option<usize>,
}

/// Apply CLI flags (highest precedence) and re-validate.
pub fn apply_overrides(settings: &mut Settings, overrides: &Overrides) -> Result<()> {
    if let Some(log_level) = &overrides.log_level {
        settings.log_level = log_level.clone();
    }
    if let Some(catalog) = &overrides.catalog {
        settings.catalog_path = catalog.clone();
    }
    if let Some(backend) = &overrides.backend {
        settings.backend = backend.parse::<FeatureStrategy>()?;
    }
    if let Some(top_k) = overrides.top_k {
        settings.default_top_k = top_k;
    }
    settings.validate()?;
    Ok(())
}

fn load_settings(config_path: Option<&str>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut settings, overrides)?;
    init_logging(&settings.log_level)?;
    Ok(settings)
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Cancel the token on Ctrl-C so a long build stops cleanly.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

/// Expand query paths: files are kept as given, directories contribute
/// their image files in name order.
pub fn expand_inputs(paths: &[String]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for raw in paths {
        let path = PathBuf::from(raw);
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(&path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect();
            found.sort();
            inputs.extend(found);
        } else if path.exists() {
            inputs.push(path);
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(inputs)
}

/// One line of `match` output.
#[derive(Debug, Serialize)]
struct MatchOutput<'a> {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<&'a [MatchResult]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `index` output.
#[derive(Debug, Serialize)]
struct IndexOutput<'a> {
    index: IndexStats,
    build: &'a BuildStats,
}

async fn build_service(settings: &Settings) -> Result<MatchService> {
    let service = MatchService::from_settings(settings)
        .await
        .context("Failed to initialize feature extractor")?;

    let cancel = cancel_on_ctrl_c();
    service
        .rebuild_from_path(&settings.expanded_catalog_path(), &cancel)
        .await
        .with_context(|| format!("Failed to index catalog {}", settings.catalog_path))?;

    Ok(service)
}

/// Index the catalog, then match every query image and print one JSON
/// line per image.
pub async fn match_images(
    config_path: Option<&str>,
    overrides: Overrides,
    paths: &[String],
) -> Result<()> {
    let settings = load_settings(config_path, &overrides)?;
    let inputs = expand_inputs(paths)?;
    if inputs.is_empty() {
        bail!("No query images found");
    }

    let service = build_service(&settings).await?;
    let top_k = settings.default_top_k;

    info!(queries = inputs.len(), top_k, "Matching images");

    for path in inputs {
        let image = path.display().to_string();
        let line = match service.match_path(path, top_k).await {
            Ok(results) => serde_json::to_string(&MatchOutput {
                image,
                matches: Some(results.as_slice()),
                error: None,
            })?,
            Err(e) => {
                warn!(image = %image, error = %e, "Match failed");
                serde_json::to_string(&MatchOutput {
                    image,
                    matches: None,
                    error: Some(e.to_string()),
                })?
            }
        };
        println!("{line}");
    }

    Ok(())
}

/// Build the catalog index and print index and build statistics.
pub async fn build_index(config_path: Option<&str>, overrides: Overrides) -> Result<()> {
    let settings = load_settings(config_path, &overrides)?;
    let service = build_service(&settings).await?;

    let engine = service.snapshot();
    let output = IndexOutput {
        index: engine.stats(),
        build: engine.index().build_stats(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Download the encoder weights into the model cache.
pub async fn warm_model(config_path: Option<&str>, overrides: Overrides) -> Result<()> {
    let settings = load_settings(config_path, &overrides)?;

    if settings.backend == FeatureStrategy::Hash {
        info!("Hash backend needs no model weights");
        return Ok(());
    }

    let owned = settings.clone();
    let extractor = tokio::task::spawn_blocking(move || FeatureExtractor::from_settings(&owned))
        .await?
        .context("Failed to load image encoder")?;

    let cache = model_cache(&settings);
    info!(
        extractor = %extractor.describe(),
        path = %cache.model_dir().display(),
        "Model cached"
    );
    println!("{}", cache.model_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_take_precedence() {
        let mut settings = Settings::default();
        let overrides = Overrides {
            log_level: Some("debug".to_string()),
            catalog: Some("/data/catalog.json".to_string()),
            backend: Some("hash".to_string()),
            top_k: Some(3),
        };
        apply_overrides(&mut settings, &overrides).unwrap();

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.catalog_path, "/data/catalog.json");
        assert_eq!(settings.backend, FeatureStrategy::Hash);
        assert_eq!(settings.default_top_k, 3);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut settings = Settings::default();
        let overrides = Overrides {
            backend: Some("sift".to_string()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut settings, &overrides).is_err());
    }

    #[test]
    fn test_no_overrides_keeps_settings() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &Overrides::default()).unwrap();
        assert_eq!(settings.default_top_k, 5);
        assert_eq!(settings.backend, FeatureStrategy::Embedding);
    }

    #[test]
    fn test_expand_inputs_directory() {
        let temp = TempDir::new().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt"] {
            std::fs::write(temp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(temp.path().join("nested.png")).unwrap();

        let inputs = expand_inputs(&[temp.path().to_string_lossy().to_string()]).unwrap();
        let names: Vec<String> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn test_expand_inputs_keeps_explicit_files() {
        let temp = TempDir::new().unwrap();
        let upload = temp.path().join("upload.bin");
        std::fs::write(&upload, b"x").unwrap();

        let inputs = expand_inputs(&[upload.to_string_lossy().to_string()]).unwrap();
        assert_eq!(inputs, vec![upload]);
    }

    #[test]
    fn test_expand_inputs_missing_path() {
        assert!(expand_inputs(&["/definitely/not/here.png".to_string()]).is_err());
    }
}
