//! Match engine facade.
//!
//! Pairs a feature extractor with an index built by the same strategy.
//! Immutable once constructed; share it behind an `Arc`.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info};

use matcher_features::{load_image, Feature, FeatureExtractor};
use matcher_index::{CatalogIndex, IndexStats};
use matcher_types::MatchResult;

use crate::aggregate::aggregate;
use crate::error::EngineError;

/// Query-time matcher over one immutable index snapshot.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    extractor: FeatureExtractor,
    index: Arc<CatalogIndex>,
}

impl MatchEngine {
    /// Pair an extractor with an index.
    ///
    /// Fails with [`EngineError::StrategyMismatch`] if the index was built
    /// with a different feature strategy, or with features of a different
    /// length (another hash size or encoder dimension).
    pub fn new(extractor: FeatureExtractor, index: Arc<CatalogIndex>) -> Result<Self, EngineError> {
        let layout_differs = index.dimension() != 0 && index.dimension() != extractor.dimension();
        if extractor.kind() != index.kind() || layout_differs {
            return Err(EngineError::StrategyMismatch {
                extractor: extractor.kind(),
                extractor_dimension: extractor.dimension(),
                index: index.kind(),
                index_dimension: index.dimension(),
            });
        }

        info!(
            extractor = %extractor.describe(),
            images = index.len(),
            "Match engine ready"
        );

        Ok(Self { extractor, index })
    }

    /// Engine over an empty index; every query returns no matches.
    pub fn empty(extractor: FeatureExtractor) -> Self {
        let index = Arc::new(CatalogIndex::empty(extractor.kind(), extractor.dimension()));
        Self { extractor, index }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn index(&self) -> &Arc<CatalogIndex> {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Rank catalog products against a query image.
    ///
    /// At most `top_k` results, best first.
    pub fn match_image(
        &self,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, EngineError> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let query = self.extractor.extract(image)?;
        self.match_feature(&query, top_k)
    }

    /// Rank catalog products against an already extracted query feature.
    pub fn match_feature(
        &self,
        query: &Feature,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, EngineError> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let k = top_k.saturating_mul(2).min(self.index.len());
        let candidates = self.index.search(query, k)?;
        let results = aggregate(&candidates, self.index.images(), top_k);

        debug!(
            candidates = candidates.len(),
            results = results.len(),
            best = results.first().map(|r| r.score),
            "Match complete"
        );

        Ok(results)
    }

    /// Load an image from disk and match it.
    pub fn match_path(&self, path: &Path, top_k: usize) -> Result<Vec<MatchResult>, EngineError> {
        let image = load_image(path)?;
        self.match_image(&image, top_k)
    }
}
