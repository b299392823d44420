//! Similarity backends.
//!
//! Both backends are exact linear scans over a few dozen rows:
//! - Flat: inner product over a contiguous row-major f32 matrix
//! - Hamming: normalized Hamming similarity over perceptual hashes
//!
//! Results are ordered by score descending, ties by ascending row, so a
//! search over a fixed index is fully deterministic.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use matcher_features::{Embedding, Feature, FeatureKind, PerceptualHash};

use crate::error::IndexError;

/// One candidate row returned by a backend search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchResult {
    /// Row in the index (catalog order)
    pub row: usize,
    /// Similarity; higher is better
    pub score: f32,
}

impl SearchResult {
    pub fn new(row: usize, score: f32) -> Self {
        Self { row, score }
    }
}

/// Score descending, then row ascending.
fn rank(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

fn top_k(mut results: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
    results.sort_by(rank);
    results.truncate(k);
    results
}

/// Exact inner-product index over unit vectors.
#[derive(Debug, Clone, Default)]
pub struct FlatIpIndex {
    dimension: usize,
    /// Row-major, `len * dimension` values
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(dimension: usize, rows: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension * rows),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a row. The first row fixes the dimension of a zero-dimension index.
    pub fn add(&mut self, embedding: &Embedding) -> Result<usize, IndexError> {
        if self.dimension == 0 && self.data.is_empty() {
            self.dimension = embedding.dimension();
        }
        if embedding.dimension() != self.dimension || self.dimension == 0 {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        self.data.extend_from_slice(&embedding.values);
        Ok(self.len() - 1)
    }

    /// The stored vector for a row
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` rows with the highest inner product.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        if query.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.dimension(),
            });
        }

        let scored = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, values)| {
                let score = values.iter().zip(query.values.iter()).map(|(a, b)| a * b).sum();
                SearchResult::new(row, score)
            })
            .collect();

        Ok(top_k(scored, k))
    }
}

/// Linear-scan index over fixed-length perceptual hashes.
#[derive(Debug, Clone, Default)]
pub struct HammingIndex {
    bits: usize,
    hashes: Vec<PerceptualHash>,
}

/// Map a Hamming distance onto `[0, 1]`; 1.0 for identical hashes.
pub fn hamming_score(distance: u32, bits: usize) -> f32 {
    if bits == 0 {
        return 0.0;
    }
    (1.0 - distance as f32 / bits as f32).max(0.0)
}

impl HammingIndex {
    pub fn new(bits: usize) -> Self {
        Self {
            bits,
            hashes: Vec::new(),
        }
    }

    /// Hash length in bits; also the maximum distance
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn add(&mut self, hash: &PerceptualHash) -> Result<usize, IndexError> {
        if self.bits == 0 && self.hashes.is_empty() {
            self.bits = hash.len();
        }
        if hash.len() != self.bits {
            return Err(IndexError::DimensionMismatch {
                expected: self.bits,
                actual: hash.len(),
            });
        }
        self.hashes.push(hash.clone());
        Ok(self.hashes.len() - 1)
    }

    pub fn search(
        &self,
        query: &PerceptualHash,
        k: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let mut scored = Vec::with_capacity(self.hashes.len());
        for (row, hash) in self.hashes.iter().enumerate() {
            let distance = query.hamming(hash)?;
            scored.push(SearchResult::new(row, hamming_score(distance, self.bits)));
        }

        Ok(top_k(scored, k))
    }
}

/// Query-time similarity structure, one variant per feature kind.
#[derive(Debug, Clone)]
pub enum SimilarityBackend {
    Flat(FlatIpIndex),
    Hamming(HammingIndex),
}

impl SimilarityBackend {
    /// Empty backend for a feature kind
    pub fn empty(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Embedding => SimilarityBackend::Flat(FlatIpIndex::default()),
            FeatureKind::Hash => SimilarityBackend::Hamming(HammingIndex::default()),
        }
    }

    /// Empty backend with a fixed vector dimension or hash bit length.
    ///
    /// A zero `dimension` is fixed by the first added row.
    pub fn with_dimension(kind: FeatureKind, dimension: usize) -> Self {
        match kind {
            FeatureKind::Embedding => SimilarityBackend::Flat(FlatIpIndex::new(dimension)),
            FeatureKind::Hash => SimilarityBackend::Hamming(HammingIndex::new(dimension)),
        }
    }

    /// Build a backend from features in row order.
    pub fn from_features<'a>(
        kind: FeatureKind,
        features: impl IntoIterator<Item = &'a Feature>,
    ) -> Result<Self, IndexError> {
        let mut backend = Self::empty(kind);
        for feature in features {
            backend.add(feature)?;
        }
        Ok(backend)
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            SimilarityBackend::Flat(_) => FeatureKind::Embedding,
            SimilarityBackend::Hamming(_) => FeatureKind::Hash,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SimilarityBackend::Flat(index) => index.len(),
            SimilarityBackend::Hamming(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension or hash bit length
    pub fn dimension(&self) -> usize {
        match self {
            SimilarityBackend::Flat(index) => index.dimension(),
            SimilarityBackend::Hamming(index) => index.bits(),
        }
    }

    pub fn add(&mut self, feature: &Feature) -> Result<usize, IndexError> {
        match (self, feature) {
            (SimilarityBackend::Flat(index), Feature::Embedding(e)) => index.add(e),
            (SimilarityBackend::Hamming(index), Feature::Hash(h)) => index.add(h),
            (backend, feature) => Err(kind_mismatch(backend.kind(), feature.kind())),
        }
    }

    /// Top `k` rows for a query feature of the same kind.
    pub fn search(&self, query: &Feature, k: usize) -> Result<Vec<SearchResult>, IndexError> {
        let results = match (self, query) {
            (SimilarityBackend::Flat(index), Feature::Embedding(e)) => index.search(e, k)?,
            (SimilarityBackend::Hamming(index), Feature::Hash(h)) => index.search(h, k)?,
            (backend, query) => return Err(kind_mismatch(backend.kind(), query.kind())),
        };
        debug!(k, found = results.len(), kind = %self.kind(), "Search complete");
        Ok(results)
    }
}

fn kind_mismatch(expected: FeatureKind, actual: FeatureKind) -> IndexError {
    IndexError::KindMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
