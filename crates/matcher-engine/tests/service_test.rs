//! Integration tests for the live match service.
//!
//! Catalog images come from an in-memory fetcher so the tests run offline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};

use matcher_engine::{EngineError, MatchService};
use matcher_features::FeatureExtractor;
use matcher_index::{BuildConfig, CancellationToken, CatalogIndexBuilder, FetchError, ImageFetcher};
use matcher_types::{save_catalog, Product};

struct MemoryFetcher {
    images: HashMap<String, DynamicImage>,
    delay: Duration,
}

#[async_trait]
impl ImageFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError> {
        tokio::time::sleep(self.delay).await;
        self.images
            .get(url)
            .cloned()
            .ok_or(FetchError::Http { status: 404 })
    }
}

fn pattern(seed: u32) -> DynamicImage {
    let fx = 0.05 + seed as f32 * 0.013;
    let fy = 0.11 - seed as f32 * 0.004;
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
        let v = 128.0 + 100.0 * (x as f32 * fx + seed as f32).sin() * (y as f32 * fy).cos();
        let v = v.clamp(0.0, 255.0) as u8;
        Rgb([v, 255 - v, v / 2])
    }))
}

fn url(seed: u32) -> String {
    format!("https://cdn.example/{seed}.png")
}

fn product(id: &str, seed: u32) -> Product {
    Product::new(
        id,
        id,
        id.to_uppercase(),
        format!("https://shop.example/products/{id}"),
        vec![url(seed)],
    )
}

fn service(seeds: &[u32], delay: Duration) -> MatchService {
    let fetcher = MemoryFetcher {
        images: seeds.iter().map(|&s| (url(s), pattern(s))).collect(),
        delay,
    };
    let builder = CatalogIndexBuilder::new(
        FeatureExtractor::hash(8).unwrap(),
        Arc::new(fetcher),
        BuildConfig::new(24, 1),
    )
    .unwrap();
    MatchService::new(builder)
}

#[tokio::test]
async fn test_new_service_matches_nothing() {
    let service = service(&[1], Duration::ZERO);
    assert_eq!(service.stats().images, 0);

    let results = service.match_image(pattern(1), 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_rebuild_swaps_in_new_index() {
    let service = service(&[3, 17], Duration::ZERO);
    let before = service.snapshot();

    let catalog = vec![product("alpha", 3), product("beta", 17)];
    let stats = service.rebuild(&catalog, &CancellationToken::new()).await.unwrap();
    assert_eq!(stats.images, 2);
    assert_eq!(stats.products, 2);

    // Old snapshot is untouched
    assert!(before.index().is_empty());

    let results = service.match_image(pattern(17), 1).await.unwrap();
    assert_eq!(results[0].product_id, "beta");
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn test_cancelled_rebuild_keeps_live_index() {
    let service = service(&[5, 9], Duration::ZERO);
    service
        .rebuild(&[product("first", 5)], &CancellationToken::new())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = service.rebuild(&[product("second", 9)], &cancel).await;
    assert!(matches!(result, Err(EngineError::Index(_))));

    let live = service.snapshot();
    assert_eq!(live.index().len(), 1);
    assert_eq!(live.index().images()[0].product_id, "first");
}

#[tokio::test]
async fn test_queries_not_blocked_by_rebuild() {
    let service = Arc::new(service(&[2, 4], Duration::from_millis(300)));

    let rebuilding = service.clone();
    let handle = tokio::spawn(async move {
        rebuilding
            .rebuild(&[product("slow", 2)], &CancellationToken::new())
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let query = service.match_image(pattern(2), 5);
    let during = tokio::time::timeout(Duration::from_millis(100), query)
        .await
        .expect("query should not wait for the rebuild")
        .unwrap();
    assert!(during.is_empty());

    handle.await.unwrap().unwrap();
    let after = service.match_image(pattern(2), 5).await.unwrap();
    assert_eq!(after[0].product_id, "slow");
}

#[tokio::test]
async fn test_rebuild_from_catalog_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("catalog.json");
    save_catalog(&[product("gamma", 8), product("delta", 12)], &path).unwrap();

    let service = service(&[8, 12], Duration::ZERO);
    let stats = service
        .rebuild_from_path(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.images, 2);
    assert_eq!(stats.kind, "hash");
}

#[tokio::test]
async fn test_rebuild_from_missing_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let service = service(&[], Duration::ZERO);
    let result = service
        .rebuild_from_path(&temp.path().join("nope.json"), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(EngineError::Catalog(_))));
}

#[tokio::test]
async fn test_match_path_uses_snapshot() {
    let temp = tempfile::TempDir::new().unwrap();
    let query = temp.path().join("ticket-attachment.png");
    pattern(6).save(&query).unwrap();

    let service = service(&[6], Duration::ZERO);
    service
        .rebuild(&[product("eps", 6)], &CancellationToken::new())
        .await
        .unwrap();

    let results = service.match_path(query, 3).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].product_id, "eps");
}

#[tokio::test]
async fn test_stats_serialize() {
    let service = service(&[], Duration::ZERO);
    let json = serde_json::to_value(service.stats()).unwrap();
    assert_eq!(json["images"], 0);
    assert_eq!(json["kind"], "hash");
}
