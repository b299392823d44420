//! End-to-end tests for catalog file handling: exporter formats, id
//! fallbacks and blank image entries flowing through a real build.

use pretty_assertions::assert_eq;
use serde_json::json;

use e2e_tests::{color_extractor, http_service, solid, TestHarness};
use matcher_index::{BuildConfig, CancellationToken};
use matcher_types::load_catalog;

#[tokio::test]
async fn test_exporter_records_with_fallbacks() {
    let harness = TestHarness::new().await;
    let red = harness.serve_image("/red.png", &solid(250, 5, 5)).await;
    let blue = harness.serve_image("/blue.png", &solid(5, 5, 250)).await;

    let path = harness.write_raw_catalog(&json!({
        "products": [
            {
                "shopify_product_id": 8812345,
                "handle": "red-cap",
                "title": "Red Cap",
                "online_store_url": "https://shop.example/products/red-cap",
                "images": [red]
            },
            {
                "id": "",
                "shopify_product_id": "gid-77",
                "handle": "blank",
                "images": [null, blue.clone()]
            },
            {
                "id": "blue-scarf",
                "handle": "blue-scarf",
                "online_store_url": "https://shop.example/products/blue-scarf",
                "images": [blue]
            }
        ]
    }));

    let catalog = load_catalog(&path).unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog[0].id, "8812345");
    assert_eq!(catalog[1].id, "gid-77");
    assert_eq!(catalog[1].images[0], "");

    // One image slot per product: the null entry uses up "gid-77"'s slot
    let service = http_service(color_extractor(), BuildConfig::new(24, 1));
    service
        .rebuild_from_path(&path, &CancellationToken::new())
        .await
        .unwrap();

    let engine = service.snapshot();
    let ids: Vec<&str> = engine
        .index()
        .images()
        .iter()
        .map(|i| i.product_id.as_str())
        .collect();
    assert_eq!(ids, vec!["8812345", "blue-scarf"]);
    assert_eq!(engine.index().build_stats().skipped_empty_url, 1);

    let query = harness.write_query("photo.png", &solid(255, 0, 0));
    let results = service.match_path(query, 1).await.unwrap();
    assert_eq!(results[0].product_id, "8812345");
    assert_eq!(results[0].url, "https://shop.example/products/red-cap");
}

#[tokio::test]
async fn test_bare_array_catalog() {
    let harness = TestHarness::new().await;
    let green = harness.serve_image("/g.png", &solid(0, 200, 0)).await;

    let path = harness.write_raw_catalog(&json!([
        { "id": "leaf", "images": [green] },
        { "id": "bare" }
    ]));

    let service = http_service(color_extractor(), BuildConfig::default());
    let stats = service
        .rebuild_from_path(&path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.images, 1);
    assert_eq!(stats.products, 1);
}

#[tokio::test]
async fn test_second_image_reached_with_wider_product_cap() {
    let harness = TestHarness::new().await;
    let blue = harness.serve_image("/blue.png", &solid(5, 5, 250)).await;

    let path = harness.write_raw_catalog(&json!([
        { "id": "two-slot", "images": [null, blue] }
    ]));

    let service = http_service(color_extractor(), BuildConfig::new(24, 2));
    service
        .rebuild_from_path(&path, &CancellationToken::new())
        .await
        .unwrap();

    let engine = service.snapshot();
    assert_eq!(engine.index().len(), 1);
    assert_eq!(engine.index().images()[0].position, 1);
}

#[tokio::test]
async fn test_catalog_round_trip_through_file() {
    let harness = TestHarness::new().await;
    let url = harness.url("/x.png");
    let products = vec![e2e_tests::product("round-trip", vec![url.clone()])];

    let path = harness.write_catalog(&products);
    let loaded = load_catalog(&path).unwrap();
    assert_eq!(loaded, products);
}
