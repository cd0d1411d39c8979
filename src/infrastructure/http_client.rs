//! HTTP client for listing pages
//!
//! Challenge and error pages are served with non-success statuses, so the
//! body is returned regardless of the status code and classification is
//! left to the page processor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::config::HttpConfig;
use super::processing_error::{ProcessingError, ProcessingResult};
use crate::domain::services::PageFetcher;

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(config.cookie_store)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch URL and return text content
    pub async fn get_text(&self, url: &str) -> ProcessingResult<String> {
        info!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProcessingError::fetch(url, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProcessingError::fetch(url, format!("failed to read body: {e}")))?;

        debug!("Fetched {} ({}, {} bytes)", url, status, text.len());

        if text.is_empty() {
            return Err(ProcessingError::fetch(url, format!("empty body (status {status})")));
        }

        Ok(text)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> ProcessingResult<String> {
        self.get_text(url).await
    }
}
