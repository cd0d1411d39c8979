//! Fetch-classify-extract for a single listing page
//!
//! Anti-bot challenges and site error pages are waited out and the same
//! request is tried again. Live fetches keep retrying until the page comes
//! through; replayed pages get a bounded number of retries. Pages that
//! cannot be parsed are skipped and, on live fetches, kept as debug
//! artifacts.

use chrono::Utc;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::domain::services::{ArtifactReason, ArtifactSink, PageFetcher, Sleeper};
use crate::domain::{page_identifier, parse_euros, Observation, PriceTier, TierPrices, TIER_COUNT};
use crate::infrastructure::config::{CooldownConfig, SiteConfig};
use crate::infrastructure::html_parser::{ListingPageExtractor, PageClassification};
use crate::infrastructure::processing_error::{ProcessingError, ProcessingResult};

/// One page to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub group_id: String,
    pub url: String,
    /// Captured page text used instead of fetching `url`
    pub raw_override: Option<String>,
}

impl PageRequest {
    pub fn live(group_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            url: url.into(),
            raw_override: None,
        }
    }

    pub fn replay(group_id: impl Into<String>, url: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            url: url.into(),
            raw_override: Some(raw.into()),
        }
    }

    pub const fn is_replay(&self) -> bool {
        self.raw_override.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Recorded(Observation),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingTitle,
    MissingPriceBlock,
    /// A replayed page kept classifying as retryable
    RetriesExhausted(RetryReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    SoftBlock,
    SiteError,
}

pub struct PageProcessor {
    extractor: ListingPageExtractor,
    cooldowns: CooldownConfig,
    fetcher: Arc<dyn PageFetcher>,
    sleeper: Arc<dyn Sleeper>,
    artifacts: Option<Arc<dyn ArtifactSink>>,
}

impl PageProcessor {
    pub fn new(
        site: &SiteConfig,
        cooldowns: CooldownConfig,
        fetcher: Arc<dyn PageFetcher>,
        sleeper: Arc<dyn Sleeper>,
    ) -> ProcessingResult<Self> {
        Ok(Self {
            extractor: ListingPageExtractor::new(site)?,
            cooldowns,
            fetcher,
            sleeper,
            artifacts: None,
        })
    }

    #[must_use]
    pub fn with_artifact_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    pub async fn process(&self, request: &PageRequest) -> ProcessingResult<ProcessOutcome> {
        let page = page_identifier(&request.url);
        let mut retries = 0_u32;

        loop {
            let started = Instant::now();
            let observed_at = Utc::now();

            let raw = self.obtain(request).await.inspect_err(|e| {
                warn!("{} ({}): {}", page, request.url, e);
            })?;
            let elapsed_ms = started.elapsed().as_millis();

            let (reason, cooldown) = match self.extractor.classify(&raw) {
                PageClassification::Listing { title, tier_texts } => {
                    let observation = build_observation(request, title, &tier_texts, observed_at);
                    info!(
                        "Recorded {} ({}, {}): {} of {} tiers in stock, {} ms",
                        observation.display_name,
                        page,
                        request.url,
                        observation.tier_prices.available(),
                        TIER_COUNT,
                        elapsed_ms
                    );
                    return Ok(ProcessOutcome::Recorded(observation));
                }
                PageClassification::MissingTitle => {
                    warn!("No title found on {} ({}), {} ms", page, request.url, elapsed_ms);
                    self.keep_artifact(request, ArtifactReason::NoTitle, observed_at, &raw).await;
                    return Ok(ProcessOutcome::Skipped(SkipReason::MissingTitle));
                }
                PageClassification::MissingPriceBlock { title } => {
                    warn!(
                        "No price tiers found for {} ({}, {}), {} ms",
                        title, page, request.url, elapsed_ms
                    );
                    self.keep_artifact(request, ArtifactReason::NoPriceBlock, observed_at, &raw).await;
                    return Ok(ProcessOutcome::Skipped(SkipReason::MissingPriceBlock));
                }
                PageClassification::SoftBlock => {
                    warn!("Bot challenge on {} ({}), {} ms", page, request.url, elapsed_ms);
                    (RetryReason::SoftBlock, self.cooldowns.soft_block())
                }
                PageClassification::SiteError { title } => {
                    warn!("Site error on {} ({}): {:?}, {} ms", page, request.url, title, elapsed_ms);
                    (RetryReason::SiteError, self.cooldowns.site_error())
                }
            };

            if request.is_replay() {
                if retries >= self.cooldowns.replay_retry_limit {
                    warn!("Giving up on replayed page {} after {} retries", page, retries);
                    return Ok(ProcessOutcome::Skipped(SkipReason::RetriesExhausted(reason)));
                }
                retries += 1;
            }

            info!("Waiting {} before retrying {}", format_duration(cooldown), page);
            self.sleeper.sleep(cooldown).await;
        }
    }

    async fn obtain<'a>(&self, request: &'a PageRequest) -> ProcessingResult<Cow<'a, str>> {
        let raw = match &request.raw_override {
            Some(raw) => Cow::Borrowed(raw.as_str()),
            None => Cow::Owned(self.fetcher.fetch(&request.url).await?),
        };

        if raw.is_empty() {
            return Err(ProcessingError::fetch(&request.url, "no page content"));
        }
        Ok(raw)
    }

    /// Artifacts are only written for live fetches
    async fn keep_artifact(
        &self,
        request: &PageRequest,
        reason: ArtifactReason,
        observed_at: chrono::DateTime<Utc>,
        raw: &str,
    ) {
        if request.is_replay() {
            return;
        }
        let Some(sink) = &self.artifacts else {
            return;
        };
        if let Err(e) = sink.persist(reason, observed_at, &request.url, raw).await {
            warn!("Failed to keep debug page for {}: {}", request.url, e);
        }
    }
}

fn build_observation(
    request: &PageRequest,
    title: String,
    tier_texts: &[String],
    observed_at: chrono::DateTime<Utc>,
) -> Observation {
    for (tier, text) in PriceTier::ALL.iter().zip(tier_texts) {
        if parse_euros(text).is_none() {
            debug!("{} sold out for {}: {:?}", tier, title, text);
        }
    }
    if tier_texts.len() > TIER_COUNT {
        debug!("Ignoring {} extra tier entries for {}", tier_texts.len() - TIER_COUNT, title);
    }

    Observation::new(
        request.group_id.as_str(),
        request.url.as_str(),
        title,
        observed_at,
        TierPrices::from_texts(tier_texts),
    )
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{} min", secs / 60)
    } else {
        format!("{} ms", duration.as_millis())
    }
}
