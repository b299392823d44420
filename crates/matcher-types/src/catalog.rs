//! Catalog products and catalog file I/O.
//!
//! Catalog records come from an external exporter (storefront API or
//! sitemap crawl). Files are either a bare JSON array of products or an
//! object of the form `{"products": [...]}`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::MatcherError;

/// A product in the merchant catalog.
///
/// Immutable for the lifetime of one matching session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CatalogRecord")]
pub struct Product {
    /// Catalog-stable product identifier
    pub id: String,
    /// Storefront handle (URL slug)
    pub handle: String,
    /// Display title
    pub title: String,
    /// Canonical storefront URL
    #[serde(rename = "online_store_url")]
    pub url: String,
    /// Ordered image URLs; empty entries are kept so positions stay stable
    pub images: Vec<String>,
}

impl Product {
    /// Create a new product record.
    pub fn new(
        id: impl Into<String>,
        handle: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            title: title.into(),
            url: url.into(),
            images,
        }
    }
}

/// Raw catalog record as written by exporters.
///
/// Every field is optional; [`Product`] applies the fallbacks.
#[derive(Debug, Default, Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    shopify_product_id: Option<Value>,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    online_store_url: Option<String>,
    #[serde(default)]
    images: Option<Vec<Option<String>>>,
}

impl From<CatalogRecord> for Product {
    fn from(record: CatalogRecord) -> Self {
        // An empty primary id falls back to the alternate identifier.
        let id = match record.id.as_ref().map(stringify) {
            Some(id) if !id.is_empty() => id,
            _ => record
                .shopify_product_id
                .as_ref()
                .map(stringify)
                .unwrap_or_default(),
        };

        Self {
            id,
            handle: record.handle.unwrap_or_default(),
            title: record.title.unwrap_or_default(),
            url: record.online_store_url.unwrap_or_default(),
            images: record
                .images
                .unwrap_or_default()
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load a catalog from a JSON file.
///
/// Accepts either a JSON array of products or `{"products": [...]}`.
/// Any other top-level shape yields an empty catalog.
pub fn load_catalog(path: &Path) -> Result<Vec<Product>, MatcherError> {
    let raw = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&raw)?;

    let products = match data {
        Value::Array(_) => serde_json::from_value(data)?,
        Value::Object(mut map) => match map.remove("products") {
            Some(products) => serde_json::from_value(products)?,
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    debug!(path = ?path, count = products.len(), "Loaded catalog");
    Ok(products)
}

/// Save a catalog as `{"products": [...]}`, creating parent directories.
pub fn save_catalog(products: &[Product], path: &Path) -> Result<(), MatcherError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let body = serde_json::json!({ "products": products });
    std::fs::write(path, serde_json::to_string_pretty(&body)?)?;

    debug!(path = ?path, count = products.len(), "Saved catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_product_from_full_record() {
        let json = r#"{
            "id": "gid://shopify/Product/1",
            "handle": "red-mug",
            "title": "Red Mug",
            "online_store_url": "https://shop.example/products/red-mug",
            "images": ["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"]
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "gid://shopify/Product/1");
        assert_eq!(product.handle, "red-mug");
        assert_eq!(product.url, "https://shop.example/products/red-mug");
        assert_eq!(product.images.len(), 2);
    }

    #[test]
    fn test_missing_id_falls_back_to_alternate() {
        let json = r#"{"shopify_product_id": 4242, "handle": "x"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "4242");

        let json = r#"{"id": "", "shopify_product_id": "abc"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "abc");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let product: Product = serde_json::from_str("{}").unwrap();
        assert_eq!(product.id, "");
        assert!(product.images.is_empty());
        assert_eq!(product.url, "");
    }

    #[test]
    fn test_null_images_become_empty_urls() {
        let json = r#"{"id": "p1", "images": [null, "https://cdn.example/a.png"]}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.images, vec!["".to_string(), "https://cdn.example/a.png".to_string()]);
    }

    #[test]
    fn test_load_catalog_array_form() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        std::fs::write(&path, r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();

        let products = load_catalog(&path).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].id, "b");
    }

    #[test]
    fn test_load_catalog_object_form() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        std::fs::write(&path, r#"{"products": [{"id": "a", "images": ["u"]}]}"#).unwrap();

        let products = load_catalog(&path).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].images, vec!["u".to_string()]);
    }

    #[test]
    fn test_load_catalog_without_products_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        std::fs::write(&path, r#"{"items": []}"#).unwrap();

        assert!(load_catalog(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_products() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("catalog.json");
        let products = vec![Product::new(
            "p1",
            "blue-vase",
            "Blue Vase",
            "https://shop.example/products/blue-vase",
            vec!["https://cdn.example/v.jpg".to_string()],
        )];

        save_catalog(&products, &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("online_store_url"));

        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded, products);
    }
}
