//! Catalog index builder.
//!
//! Walks the catalog in order, fetches each candidate image, extracts its
//! feature and appends it to the index. Fetches run concurrently but are
//! consumed in catalog order, so the result equals a sequential walk:
//! - at most `max_images_per_product` URL slots per product
//! - stop as soon as `max_catalog_images` images are indexed
//! - empty URLs and failed fetches/extractions are skipped, never fatal

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use matcher_features::{Feature, FeatureError, FeatureExtractor};
use matcher_types::{Product, Settings};

use crate::error::{FetchError, IndexError};
use crate::fetch::{FetchConfig, HttpImageFetcher, ImageFetcher};
use crate::index::{CatalogIndex, IndexedImage};

/// Index build limits.
#[derive(Debug, Clone, Copy)]
pub struct BuildConfig {
    /// Global cap on indexed images
    pub max_catalog_images: usize,
    /// Cap on image URL slots considered per product
    pub max_images_per_product: usize,
    /// Maximum fetches in flight
    pub concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_catalog_images: 24,
            max_images_per_product: 1,
            concurrency: 8,
        }
    }
}

impl BuildConfig {
    pub fn new(max_catalog_images: usize, max_images_per_product: usize) -> Self {
        Self {
            max_catalog_images,
            max_images_per_product,
            ..Default::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_catalog_images: settings.max_catalog_images,
            max_images_per_product: settings.max_images_per_product,
            concurrency: settings.fetch.concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_catalog_images < 1 {
            return Err(IndexError::InvalidConfig(
                "max_catalog_images must be >= 1".to_string(),
            ));
        }
        if self.max_images_per_product < 1 {
            return Err(IndexError::InvalidConfig(
                "max_images_per_product must be >= 1".to_string(),
            ));
        }
        if self.concurrency < 1 {
            return Err(IndexError::InvalidConfig(
                "concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a candidate image was left out of the index.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("empty image URL")]
    EmptyUrl,

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extract(#[from] FeatureError),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// A candidate image that was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedImage {
    pub product_id: String,
    pub position: usize,
    pub image_url: String,
    pub reason: String,
}

/// Statistics from one index build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Candidate URL slots consumed
    pub candidates: usize,
    /// Images added to the index
    pub indexed: usize,
    pub skipped_empty_url: usize,
    pub fetch_failures: usize,
    pub extract_failures: usize,
    pub skipped: Vec<SkippedImage>,
    pub elapsed_ms: u64,
}

impl BuildStats {
    fn record_skip(
        &mut self,
        product_id: &str,
        position: usize,
        image_url: &str,
        reason: &SkipReason,
    ) {
        match reason {
            SkipReason::EmptyUrl => self.skipped_empty_url += 1,
            SkipReason::Fetch(_) => self.fetch_failures += 1,
            SkipReason::Extract(_) | SkipReason::Task(_) => self.extract_failures += 1,
        }
        self.skipped.push(SkippedImage {
            product_id: product_id.to_string(),
            position,
            image_url: image_url.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Total candidates that did not make it into the index
    pub fn skipped_total(&self) -> usize {
        self.skipped_empty_url + self.fetch_failures + self.extract_failures
    }
}

/// One image URL slot of one product.
struct Candidate {
    product: usize,
    position: usize,
    url: String,
}

/// Builds a [`CatalogIndex`] from catalog products.
pub struct CatalogIndexBuilder {
    extractor: FeatureExtractor,
    fetcher: Arc<dyn ImageFetcher>,
    config: BuildConfig,
}

impl CatalogIndexBuilder {
    pub fn new(
        extractor: FeatureExtractor,
        fetcher: Arc<dyn ImageFetcher>,
        config: BuildConfig,
    ) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(Self {
            extractor,
            fetcher,
            config,
        })
    }

    /// Builder with an HTTP fetcher configured from settings.
    pub fn from_settings(
        extractor: FeatureExtractor,
        settings: &Settings,
    ) -> Result<Self, IndexError> {
        let fetcher = HttpImageFetcher::new(FetchConfig::from(&settings.fetch))?;
        Self::new(extractor, Arc::new(fetcher), BuildConfig::from_settings(settings))
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build an index over the catalog.
    ///
    /// Returns an empty index when nothing could be indexed. A cancelled
    /// build returns [`IndexError::Cancelled`] and no partial index.
    pub async fn build(
        &self,
        catalog: &[Product],
        cancel: &CancellationToken,
    ) -> Result<CatalogIndex, IndexError> {
        let start = Instant::now();
        let kind = self.extractor.kind();

        if cancel.is_cancelled() {
            info!("Index build cancelled before start");
            return Err(IndexError::Cancelled);
        }

        let per_product = self.config.max_images_per_product;
        let candidates: Vec<Candidate> = catalog
            .iter()
            .enumerate()
            .flat_map(|(product, p)| {
                p.images
                    .iter()
                    .take(per_product)
                    .enumerate()
                    .map(move |(position, url)| Candidate {
                        product,
                        position,
                        url: url.clone(),
                    })
            })
            .collect();

        info!(
            products = catalog.len(),
            candidates = candidates.len(),
            max_images = self.config.max_catalog_images,
            extractor = %self.extractor.describe(),
            "Building catalog index"
        );

        let mut outcomes = stream::iter(candidates)
            .map(|candidate| async move {
                let outcome = self.process(&candidate.url).await;
                (candidate, outcome)
            })
            .buffered(self.config.concurrency);

        let mut stats = BuildStats::default();
        let mut images: Vec<IndexedImage> = Vec::new();

        while images.len() < self.config.max_catalog_images {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(indexed = images.len(), "Index build cancelled");
                    return Err(IndexError::Cancelled);
                }
                next = outcomes.next() => next,
            };
            let Some((candidate, outcome)) = next else {
                break;
            };

            stats.candidates += 1;
            let product = &catalog[candidate.product];

            match outcome {
                Ok(feature) => {
                    debug!(
                        product_id = %product.id,
                        position = candidate.position,
                        row = images.len(),
                        "Indexed image"
                    );
                    images.push(IndexedImage {
                        product_id: product.id.clone(),
                        handle: product.handle.clone(),
                        title: product.title.clone(),
                        url: product.url.clone(),
                        position: candidate.position,
                        image_url: candidate.url,
                        feature,
                    });
                }
                Err(reason) => {
                    warn!(
                        product_id = %product.id,
                        image_url = %candidate.url,
                        reason = %reason,
                        "Skipping catalog image"
                    );
                    stats.record_skip(&product.id, candidate.position, &candidate.url, &reason);
                }
            }
        }

        stats.indexed = images.len();
        stats.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            indexed = stats.indexed,
            skipped = stats.skipped_total(),
            elapsed_ms = stats.elapsed_ms,
            "Catalog index built"
        );

        CatalogIndex::from_images(kind, self.extractor.dimension(), images, stats)
    }

    /// Fetch and extract one candidate.
    async fn process(&self, url: &str) -> Result<Feature, SkipReason> {
        if url.is_empty() {
            return Err(SkipReason::EmptyUrl);
        }

        let image = self.fetcher.fetch(url).await?;

        // CPU-bound; keep it off the async workers
        let extractor = self.extractor.clone();
        let feature = tokio::task::spawn_blocking(move || extractor.extract(&image))
            .await
            .map_err(|e| SkipReason::Task(e.to_string()))??;

        Ok(feature)
    }
}
