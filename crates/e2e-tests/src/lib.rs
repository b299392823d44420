//! End-to-end test infrastructure for the image matcher.
//!
//! Provides a shared TestHarness that serves catalog images over HTTP
//! (wiremock), writes catalog files, and wires the real HTTP fetcher,
//! index builder and match service together. A deterministic color
//! encoder stands in for CLIP so tests run without model weights.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use matcher_engine::MatchService;
use matcher_features::{Embedding, EncoderInfo, FeatureError, FeatureExtractor, ImageEncoder};
use matcher_index::{BuildConfig, CatalogIndexBuilder, FetchConfig, HttpImageFetcher};
use matcher_types::{save_catalog, Product};

/// Embeds an image as its normalized mean RGB color.
///
/// Cosine similarity between two solid-color images is the cosine of the
/// angle between their colors, which makes expected scores easy to derive.
pub struct ColorEncoder {
    info: EncoderInfo,
}

impl ColorEncoder {
    pub fn new() -> Self {
        Self {
            info: EncoderInfo {
                name: "mean-color".to_string(),
                pretrained: "none".to_string(),
                dimension: 3,
                image_size: 0,
            },
        }
    }
}

impl Default for ColorEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEncoder for ColorEncoder {
    fn info(&self) -> &EncoderInfo {
        &self.info
    }

    fn embed(&self, image: &DynamicImage) -> Result<Embedding, FeatureError> {
        let rgb = image.to_rgb8();
        let mut sum = [0f64; 3];
        for pixel in rgb.pixels() {
            for (c, s) in sum.iter_mut().enumerate() {
                *s += pixel[c] as f64;
            }
        }
        Ok(Embedding::new(sum.iter().map(|&v| v as f32).collect()))
    }
}

/// Solid color image.
pub fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([r, g, b])))
}

/// Smooth textured image; different seeds give clearly different hashes.
pub fn textured(seed: u32) -> DynamicImage {
    let fx = 0.04 + seed as f32 * 0.017;
    let fy = 0.09 + seed as f32 * 0.006;
    DynamicImage::ImageRgb8(RgbImage::from_fn(96, 96, |x, y| {
        let v = 128.0 + 110.0 * (x as f32 * fx + seed as f32).sin() * (y as f32 * fy + 0.3).cos();
        let v = v.clamp(0.0, 255.0) as u8;
        Rgb([v, v / 3 + 60, 255 - v])
    }))
}

/// Encode an image as PNG bytes.
pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode PNG");
    buf.into_inner()
}

/// Shared test harness for E2E tests.
///
/// Owns a mock CDN and a temp directory for catalog and query files.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Mock image host
    pub server: MockServer,
    /// Directory for catalog and query files
    pub root: PathBuf,
}

impl TestHarness {
    /// Create a new harness with a running mock server.
    pub async fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            server: MockServer::start().await,
            root,
        }
    }

    /// Absolute URL for a path on the mock server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Serve an image as PNG at `path`; returns its URL.
    pub async fn serve_image(&self, url_path: &str, image: &DynamicImage) -> String {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(png_bytes(image)),
            )
            .mount(&self.server)
            .await;
        self.url(url_path)
    }

    /// Serve an image that only arrives after `delay`.
    pub async fn serve_slow_image(
        &self,
        url_path: &str,
        image: &DynamicImage,
        delay: Duration,
    ) -> String {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png_bytes(image))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
        self.url(url_path)
    }

    /// Serve an arbitrary status at `path`; returns its URL.
    pub async fn serve_status(&self, url_path: &str, status: u16) -> String {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
        self.url(url_path)
    }

    /// Write a catalog file and return its path.
    pub fn write_catalog(&self, products: &[Product]) -> PathBuf {
        let path = self.root.join("cache").join("catalog.json");
        save_catalog(products, &path).expect("Failed to write catalog");
        path
    }

    /// Write raw catalog JSON and return its path.
    pub fn write_raw_catalog(&self, json: &serde_json::Value) -> PathBuf {
        let path = self.root.join("raw-catalog.json");
        std::fs::write(&path, serde_json::to_vec_pretty(json).expect("Failed to encode JSON"))
            .expect("Failed to write catalog");
        path
    }

    /// Save a query image to disk and return its path.
    pub fn write_query(&self, name: &str, image: &DynamicImage) -> PathBuf {
        let path = self.root.join(name);
        image.save(&path).expect("Failed to save query image");
        path
    }
}

/// Product with the given images.
pub fn product(id: &str, images: Vec<String>) -> Product {
    Product::new(
        id,
        id,
        id.replace('-', " "),
        format!("https://shop.example/products/{id}"),
        images,
    )
}

/// Fetch config with a short timeout for tests.
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        timeout: Duration::from_millis(500),
        retries: 0,
        initial_backoff: Duration::from_millis(10),
    }
}

/// Match service over the real HTTP fetcher.
pub fn http_service(extractor: FeatureExtractor, config: BuildConfig) -> MatchService {
    let fetcher = HttpImageFetcher::new(test_fetch_config()).expect("Failed to build HTTP client");
    let builder = CatalogIndexBuilder::new(extractor, Arc::new(fetcher), config)
        .expect("Invalid build config");
    MatchService::new(builder)
}

/// Embedding extractor backed by [`ColorEncoder`].
pub fn color_extractor() -> FeatureExtractor {
    FeatureExtractor::embedding(Arc::new(ColorEncoder::new()))
}

/// 8x8 perceptual hash extractor.
pub fn hash_extractor() -> FeatureExtractor {
    FeatureExtractor::hash(8).expect("Invalid hash size")
}
