//! Catalog image fetching.
//!
//! Every request carries a timeout; the builder treats any error as a skip.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use image::DynamicImage;
use reqwest::Client;
use tracing::{debug, warn};

use matcher_features::decode_image;
use matcher_types::config::FetchSettings;

use crate::error::{FetchError, IndexError};

/// Source of decoded catalog images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download and decode one image.
    async fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Retries after the first attempt (transient errors only)
    pub retries: u32,
    /// First backoff delay between attempts
    pub initial_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
            retries: 0,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            retries: settings.retries,
            ..Default::default()
        }
    }
}

/// reqwest-backed fetcher.
pub struct HttpImageFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpImageFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("image-matcher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Single attempt, no retry.
    async fn fetch_once(&self, url: &str) -> Result<DynamicImage, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), "Fetched image");
        Ok(decode_image(&bytes)?)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetch_once(url).await {
                Ok(image) => return Ok(image),
                Err(e) => {
                    if attempts > self.config.retries || !e.is_transient() {
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                url,
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Image fetch failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }
}
