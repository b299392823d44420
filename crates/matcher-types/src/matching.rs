//! Match results returned to callers.

use serde::{Deserialize, Serialize};

/// A ranked product match for a query image.
///
/// Scores are comparable within one backend only: cosine similarity for
/// the embedding backend, normalized Hamming similarity for the hash backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched product identifier
    pub product_id: String,
    /// Canonical storefront URL of the product
    pub url: String,
    /// Best image score for the product
    pub score: f32,
}

impl MatchResult {
    pub fn new(product_id: impl Into<String>, url: impl Into<String>, score: f32) -> Self {
        Self {
            product_id: product_id.into(),
            url: url.into(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_result_wire_shape() {
        let result = MatchResult::new("p1", "https://shop.example/products/p1", 0.5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["product_id"], "p1");
        assert_eq!(json["url"], "https://shop.example/products/p1");
        assert_eq!(json["score"], 0.5);
    }
}
