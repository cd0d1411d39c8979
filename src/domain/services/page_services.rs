//! Collaborators of the page processor
//!
//! Fetching, waiting and artifact persistence sit behind these traits so the
//! retry loop can be driven by scripted fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::processing_error::{ProcessingResult, StorageResult};

/// Retrieves the raw text of a listing page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Body of the response, whatever its status code
    async fn fetch(&self, url: &str) -> ProcessingResult<String>;
}

/// Blocks the current pipeline for a cooldown
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why a page was kept for later inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactReason {
    NoTitle,
    NoPriceBlock,
}

impl ArtifactReason {
    /// File name prefix of the artifact
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::NoTitle => "no-title-found-",
            Self::NoPriceBlock => "no-quality-found-",
        }
    }
}

/// Keeps unparseable pages around for debugging
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist `body` and return where it went
    async fn persist(
        &self,
        reason: ArtifactReason,
        observed_at: DateTime<Utc>,
        url: &str,
        body: &str,
    ) -> StorageResult<PathBuf>;
}
