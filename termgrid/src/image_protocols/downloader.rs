// ABOUTME: HTTP client for downloading images with size limits and content checks
// ABOUTME: Implements the ImageFetcher seam the render session pulls bytes through

use crate::error::{RenderError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const MAX_IMAGE_SIZE_ENV: &str = "TERMGRID_MAX_IMAGE_SIZE";
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of raw image bytes for a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct ImageDownloader {
    client: Client,
    max_size_bytes: u64,
}

impl ImageDownloader {
    /// Size limit from `TERMGRID_MAX_IMAGE_SIZE`, then `configured`, then 20 MB.
    pub fn new(configured: Option<&str>) -> Result<Self> {
        let env_value = std::env::var(MAX_IMAGE_SIZE_ENV).ok();
        let max_size_bytes = parse_size(env_value.as_deref().or(configured), DEFAULT_MAX_IMAGE_SIZE);
        Self::with_max_size(max_size_bytes)
    }

    pub fn with_max_size(max_size_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("termgrid/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| RenderError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_size_bytes,
        })
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    fn validate_url(&self, url: &str) -> Result<Url> {
        let parsed = Url::parse(url).map_err(|e| RenderError::fetch(url, e))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(RenderError::fetch(url, format!("unsupported scheme '{}'", scheme))),
        }
    }

    fn validate_response(&self, response: &reqwest::Response, url: &str) -> Result<()> {
        if !response.status().is_success() {
            return Err(RenderError::fetch(url, format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("");
        // CDNs sometimes omit the header or send a generic binary type
        if !(content_type.is_empty()
            || content_type.starts_with("image/")
            || content_type.starts_with("application/octet-stream"))
        {
            return Err(RenderError::fetch(
                url,
                format!("not an image (content-type: {})", content_type),
            ));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_size_bytes {
                return Err(RenderError::fetch(
                    url,
                    format!("image too large: {} bytes (max {})", length, self.max_size_bytes),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ImageFetcher for ImageDownloader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let validated = self.validate_url(url)?;

        let response = self
            .client
            .get(validated)
            .send()
            .await
            .map_err(|e| RenderError::fetch(url, e))?;
        self.validate_response(&response, url)?;

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RenderError::fetch(url, e))?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_size_bytes {
                return Err(RenderError::fetch(
                    url,
                    format!("image too large: exceeded {} bytes", self.max_size_bytes),
                ));
            }
        }

        log::debug!("Downloaded {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }
}

/// Parse sizes like `512`, `64KB` or `10MB`.
pub fn parse_size(raw: Option<&str>, default: u64) -> u64 {
    let Some(value) = raw.map(|v| v.trim().to_uppercase()) else {
        return default;
    };
    let (number, multiplier) = if let Some(n) = value.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = value.strip_suffix('B') {
        (n, 1)
    } else {
        (value.as_str(), 1)
    };
    number
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(default)
}
