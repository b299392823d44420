//! The in-memory catalog index.
//!
//! Built once, read-only afterwards. Row `i` of the backend corresponds to
//! `images[i]`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use matcher_features::{Feature, FeatureKind};

use crate::backend::{SearchResult, SimilarityBackend};
use crate::builder::BuildStats;
use crate::error::IndexError;

/// One indexed catalog image.
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub product_id: String,
    pub handle: String,
    pub title: String,
    /// Canonical storefront URL of the product
    pub url: String,
    /// Index within the product's image list
    pub position: usize,
    pub image_url: String,
    pub feature: Feature,
}

/// Summary of an index, suitable for status output.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Feature kind the index was built with
    pub kind: String,
    /// Number of indexed images
    pub images: usize,
    /// Number of distinct products with at least one indexed image
    pub products: usize,
    /// Vector dimension or hash bit length the index was built for
    pub dimension: usize,
    pub built_at: DateTime<Utc>,
}

/// Ordered indexed images plus the matching similarity backend.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    kind: FeatureKind,
    images: Vec<IndexedImage>,
    backend: SimilarityBackend,
    built_at: DateTime<Utc>,
    build: BuildStats,
}

impl CatalogIndex {
    /// An index with no rows; every query against it is empty.
    ///
    /// `dimension` records the feature layout the index was built for, so
    /// an empty index still rejects an incompatible extractor.
    pub fn empty(kind: FeatureKind, dimension: usize) -> Self {
        Self {
            kind,
            images: Vec::new(),
            backend: SimilarityBackend::with_dimension(kind, dimension),
            built_at: Utc::now(),
            build: BuildStats::default(),
        }
    }

    /// Assemble an index from images in row order.
    ///
    /// Every feature must have `dimension` values (or bits). A zero
    /// `dimension` takes the layout of the first image.
    pub fn from_images(
        kind: FeatureKind,
        dimension: usize,
        images: Vec<IndexedImage>,
        build: BuildStats,
    ) -> Result<Self, IndexError> {
        let mut backend = SimilarityBackend::with_dimension(kind, dimension);
        for image in &images {
            backend.add(&image.feature)?;
        }
        Ok(Self {
            kind,
            images,
            backend,
            built_at: Utc::now(),
            build,
        })
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[IndexedImage] {
        &self.images
    }

    /// Image at a backend row, if any
    pub fn get(&self, row: usize) -> Option<&IndexedImage> {
        self.images.get(row)
    }

    pub fn backend(&self) -> &SimilarityBackend {
        &self.backend
    }

    /// Vector dimension or hash bit length of the rows
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn build_stats(&self) -> &BuildStats {
        &self.build
    }

    /// Search the backend for the top `k` rows.
    pub fn search(&self, query: &Feature, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        self.backend.search(query, k)
    }

    pub fn stats(&self) -> IndexStats {
        let products: HashSet<&str> = self.images.iter().map(|i| i.product_id.as_str()).collect();
        IndexStats {
            kind: self.kind.to_string(),
            images: self.images.len(),
            products: products.len(),
            dimension: self.backend.dimension(),
            built_at: self.built_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matcher_features::{Embedding, PerceptualHash};

    fn image(product: &str, position: usize, feature: Feature) -> IndexedImage {
        IndexedImage {
            product_id: product.to_string(),
            handle: product.to_string(),
            title: product.to_uppercase(),
            url: format!("https://shop.example/products/{product}"),
            position,
            image_url: format!("https://cdn.example/{product}/{position}.jpg"),
            feature,
        }
    }

    #[test]
    fn test_empty_index() {
        let index = CatalogIndex::empty(FeatureKind::Embedding, 2);
        assert!(index.is_empty());
        assert!(index.get(0).is_none());
        let query = Feature::Embedding(Embedding::new(vec![1.0, 0.0]));
        assert!(index.search(&query, 5).unwrap().is_empty());

        let stats = index.stats();
        assert_eq!(stats.images, 0);
        assert_eq!(stats.kind, "embedding");
        assert_eq!(stats.dimension, 2);
    }

    #[test]
    fn test_rows_follow_image_order() {
        let images = vec![
            image("a", 0, Feature::Embedding(Embedding::new(vec![1.0, 0.0]))),
            image("a", 1, Feature::Embedding(Embedding::new(vec![0.6, 0.8]))),
            image("b", 0, Feature::Embedding(Embedding::new(vec![0.0, 1.0]))),
        ];
        let index =
            CatalogIndex::from_images(FeatureKind::Embedding, 2, images, BuildStats::default())
                .unwrap();

        let results = index
            .search(&Feature::Embedding(Embedding::new(vec![0.0, 1.0])), 3)
            .unwrap();
        assert_eq!(index.get(results[0].row).unwrap().product_id, "b");
        assert_eq!(index.get(results[1].row).unwrap().position, 1);

        let stats = index.stats();
        assert_eq!(stats.images, 3);
        assert_eq!(stats.products, 2);
        assert_eq!(stats.dimension, 2);
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let images = vec![image("a", 0, Feature::Hash(PerceptualHash::from_bits(&[true; 64])))];
        let result =
            CatalogIndex::from_images(FeatureKind::Embedding, 0, images, BuildStats::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let images = vec![image("a", 0, Feature::Hash(PerceptualHash::from_bits(&[true; 64])))];
        let result =
            CatalogIndex::from_images(FeatureKind::Hash, 256, images, BuildStats::default());
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 256,
                actual: 64
            })
        ));
    }

    #[test]
    fn test_zero_dimension_takes_first_row() {
        let images = vec![image("a", 0, Feature::Hash(PerceptualHash::from_bits(&[true; 64])))];
        let index =
            CatalogIndex::from_images(FeatureKind::Hash, 0, images, BuildStats::default()).unwrap();
        assert_eq!(index.dimension(), 64);
    }
}
