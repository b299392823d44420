//! Per-product score aggregation.
//!
//! A product is as good as its best-matching image: scores are combined by
//! maximum, never averaged.

use std::collections::HashMap;

use tracing::debug;

use matcher_index::{IndexedImage, SearchResult};
use matcher_types::MatchResult;

/// Collapse image-level candidates into a ranked product list.
///
/// Candidates whose row does not resolve to an image are dropped. Products
/// with equal scores keep the order in which they were first seen, which
/// for backend output is the catalog order of their best image.
pub fn aggregate(
    candidates: &[SearchResult],
    rows: &[IndexedImage],
    top_k: usize,
) -> Vec<MatchResult> {
    if top_k == 0 {
        return vec![];
    }

    let mut results: Vec<MatchResult> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for candidate in candidates {
        let Some(image) = rows.get(candidate.row) else {
            debug!(row = candidate.row, "Dropping candidate without an indexed image");
            continue;
        };

        match seen.get(image.product_id.as_str()) {
            Some(&slot) => {
                let best = &mut results[slot];
                if candidate.score > best.score {
                    best.score = candidate.score;
                }
            }
            None => {
                seen.insert(image.product_id.as_str(), results.len());
                results.push(MatchResult::new(
                    image.product_id.clone(),
                    image.url.clone(),
                    candidate.score,
                ));
            }
        }
    }

    // Stable: equal scores keep first-seen order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}
