//! Live match service.
//!
//! Owns the current engine snapshot and replaces it atomically on rebuild.
//! Readers clone the `Arc` and drop the lock right away, so a query never
//! waits for a build and a failed build never disturbs the live engine.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use image::DynamicImage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use matcher_features::FeatureExtractor;
use matcher_index::{CatalogIndexBuilder, IndexStats};
use matcher_types::{load_catalog, MatchResult, Product, Settings};

use crate::engine::MatchEngine;
use crate::error::EngineError;

/// Match service with atomic index replacement.
pub struct MatchService {
    builder: CatalogIndexBuilder,
    engine: RwLock<Arc<MatchEngine>>,
}

impl MatchService {
    /// Service starting from an empty index.
    pub fn new(builder: CatalogIndexBuilder) -> Self {
        let engine = MatchEngine::empty(builder.extractor().clone());
        Self {
            builder,
            engine: RwLock::new(Arc::new(engine)),
        }
    }

    /// Build the extractor and HTTP-backed builder described by settings.
    ///
    /// Loading the encoder may download weights, so it runs on the blocking pool.
    pub async fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let owned = settings.clone();
        let extractor =
            tokio::task::spawn_blocking(move || FeatureExtractor::from_settings(&owned)).await??;
        let builder = CatalogIndexBuilder::from_settings(extractor, settings)?;
        Ok(Self::new(builder))
    }

    /// Current engine snapshot.
    pub fn snapshot(&self) -> Arc<MatchEngine> {
        self.engine
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }

    /// Rebuild the index from a catalog and swap it in.
    ///
    /// The build runs without holding the lock; only the pointer swap does.
    pub async fn rebuild(
        &self,
        catalog: &[Product],
        cancel: &CancellationToken,
    ) -> Result<IndexStats, EngineError> {
        let index = match self.builder.build(catalog, cancel).await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Index rebuild failed, keeping current index");
                return Err(e.into());
            }
        };

        let engine = Arc::new(MatchEngine::new(self.builder.extractor().clone(), Arc::new(index))?);
        let stats = engine.stats();

        {
            let mut live = self
                .engine
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *live = engine;
        }

        info!(images = stats.images, products = stats.products, "Index swapped");
        Ok(stats)
    }

    /// Load a catalog file and rebuild from it.
    pub async fn rebuild_from_path(
        &self,
        catalog_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IndexStats, EngineError> {
        let catalog = load_catalog(catalog_path)?;
        self.rebuild(&catalog, cancel).await
    }

    /// Match a decoded image against the live snapshot.
    pub async fn match_image(
        &self,
        image: DynamicImage,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, EngineError> {
        let engine = self.snapshot();
        tokio::task::spawn_blocking(move || engine.match_image(&image, top_k)).await?
    }

    /// Match an image file against the live snapshot.
    pub async fn match_path(
        &self,
        path: PathBuf,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, EngineError> {
        let engine = self.snapshot();
        tokio::task::spawn_blocking(move || engine.match_path(&path, top_k)).await?
    }
}
