//! Crawl driver: walks the catalog, records observations and keeps the
//! summary file current.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::page_processor::{PageProcessor, PageRequest, ProcessOutcome};
use crate::domain::services::{PageFetcher, Sleeper, TokioSleeper};
use crate::domain::{aggregate, aggregate_group, Observation, Summary};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::csv_store::{HistoryStore, SummaryStore};
use crate::infrastructure::debug_artifacts::FileArtifactSink;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::processing_error::ProcessingResult;

/// In-memory mirror of the ledger files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub history: Vec<Observation>,
    pub summaries: Vec<Summary>,
}

impl TrackerState {
    pub fn from_history(history: Vec<Observation>) -> Self {
        let summaries = aggregate(&history);
        Self { history, summaries }
    }

    /// Add an observation and refresh its group's summary
    fn record(&mut self, observation: Observation) {
        let group_id = observation.group_id.clone();
        self.history.push(observation);

        let Some(summary) = aggregate_group(&group_id, &self.history) else {
            return;
        };
        match self.summaries.iter_mut().find(|s| s.group_id == group_id) {
            Some(existing) => *existing = summary,
            None => self.summaries.push(summary),
        }
    }
}

/// Result of one pass over the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl PassReport {
    fn tally(&mut self, result: &ProcessingResult<ProcessOutcome>) {
        match result {
            Ok(ProcessOutcome::Recorded(_)) => self.recorded += 1,
            Ok(ProcessOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct PriceTracker {
    config: AppConfig,
    processor: PageProcessor,
    sleeper: Arc<dyn Sleeper>,
    artifacts: Arc<FileArtifactSink>,
    history: HistoryStore,
    summaries: SummaryStore,
}

impl PriceTracker {
    pub fn new(config: AppConfig, fetcher: Arc<dyn PageFetcher>, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let artifacts = Arc::new(FileArtifactSink::new(&config.storage.debug_dir));
        let processor = PageProcessor::new(&config.site, config.cooldowns.clone(), fetcher, sleeper.clone())
            .context("Failed to set up page processor")?
            .with_artifact_sink(artifacts.clone());

        Ok(Self {
            history: HistoryStore::new(&config.storage.history_file),
            summaries: SummaryStore::new(&config.storage.summary_file),
            config,
            processor,
            sleeper,
            artifacts,
        })
    }

    /// Tracker fetching over HTTP and sleeping on the tokio timer
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpClient::new(&config.http)?);
        Self::new(config, fetcher, Arc::new(TokioSleeper))
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Load the history and derive the summaries from it
    pub async fn start(&self) -> Result<TrackerState> {
        self.artifacts
            .ensure_dir()
            .await
            .context("Failed to create debug directory")?;
        let history = self.history.load().await.context("Failed to load history")?;
        let state = TrackerState::from_history(history);
        info!(
            "Starting with {} observations across {} groups",
            state.history.len(),
            state.summaries.len()
        );
        Ok(state)
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.config
            .catalog
            .iter()
            .flat_map(|group| group.urls.iter().map(|url| PageRequest::live(group.id.as_str(), url.as_str())))
            .collect()
    }

    /// Visit every catalog page once
    pub async fn run_pass(&self, state: &mut TrackerState) -> Result<PassReport> {
        let started = Instant::now();
        let mut report = if self.config.crawl.parallel {
            self.run_parallel(state).await?
        } else {
            self.run_sequential(state).await?
        };
        report.elapsed = started.elapsed();

        info!(
            "Pass finished in {:.1}s: {} recorded, {} skipped, {} failed",
            report.elapsed.as_secs_f64(),
            report.recorded,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    async fn run_sequential(&self, state: &mut TrackerState) -> Result<PassReport> {
        let mut report = PassReport::default();

        for (index, request) in self.requests().iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.config.cooldowns.request_pacing()).await;
            }

            let result = self.processor.process(request).await;
            report.tally(&result);

            match result {
                Ok(ProcessOutcome::Recorded(observation)) => {
                    self.history
                        .append(&observation)
                        .await
                        .context("Failed to append to history")?;
                    state.record(observation);
                    self.summaries
                        .write(&state.summaries)
                        .await
                        .context("Failed to write summaries")?;
                }
                Ok(ProcessOutcome::Skipped(_)) => {}
                Err(e) if e.is_recoverable() => error!("Skipping {}: {}", request.url, e),
                Err(e) => return Err(e).context("Page processing failed"),
            }
        }

        Ok(report)
    }

    /// All fetches run concurrently, staggered by the pacing delay; results
    /// are stored in one go afterwards
    async fn run_parallel(&self, state: &mut TrackerState) -> Result<PassReport> {
        let pacing = self.config.cooldowns.request_pacing();
        let requests = self.requests();

        let results = join_all(requests.iter().enumerate().map(|(index, request)| async move {
            if index > 0 {
                let slot = u32::try_from(index).unwrap_or(u32::MAX);
                self.sleeper.sleep(pacing.saturating_mul(slot)).await;
            }
            self.processor.process(request).await
        }))
        .await;

        let mut report = PassReport::default();
        let mut observations = Vec::new();
        for (request, result) in requests.iter().zip(results) {
            report.tally(&result);
            match result {
                Ok(ProcessOutcome::Recorded(observation)) => observations.push(observation),
                Ok(ProcessOutcome::Skipped(_)) => {}
                Err(e) if e.is_recoverable() => error!("Skipping {}: {}", request.url, e),
                Err(e) => return Err(e).context("Page processing failed"),
            }
        }

        self.history
            .append_all(&observations)
            .await
            .context("Failed to append to history")?;
        for observation in observations {
            state.record(observation);
        }
        self.summaries
            .write(&state.summaries)
            .await
            .context("Failed to write summaries")?;

        Ok(report)
    }

    /// Repeat passes until `max_cycles` is reached (forever when `None`).
    ///
    /// A failed pass waits out the site error cooldown and starts over from
    /// the files on disk.
    pub async fn watch(&self, max_cycles: Option<u64>) -> Result<()> {
        let mut state = self.start().await?;
        let mut cycle = 0_u64;

        loop {
            cycle += 1;
            info!("Starting pass {}", cycle);

            let failed = match self.run_pass(&mut state).await {
                Ok(_) => false,
                Err(e) => {
                    error!("Pass {} failed: {:#}", cycle, e);
                    true
                }
            };

            if max_cycles.is_some_and(|max| cycle >= max) {
                return Ok(());
            }

            if failed {
                self.sleeper.sleep(self.config.cooldowns.site_error()).await;
                state = self.start().await?;
            } else {
                self.sleeper.sleep(self.config.cooldowns.cycle_pause()).await;
            }
        }
    }

    /// Rebuild the summary file from the history file alone
    pub async fn recompute_summaries(&self) -> Result<Vec<Summary>> {
        let history = self.history.load().await.context("Failed to load history")?;
        let summaries = aggregate(&history);
        if summaries.is_empty() {
            warn!("History {:?} holds no observations", self.history.path());
        }
        self.summaries
            .write(&summaries)
            .await
            .context("Failed to write summaries")?;
        info!("Recomputed {} summaries from {} observations", summaries.len(), history.len());
        Ok(summaries)
    }

    /// Run a captured page through the processor without touching the ledger
    pub async fn replay(&self, group_id: &str, url: &str, raw: String) -> Result<ProcessOutcome> {
        let request = PageRequest::replay(group_id, url, raw);
        self.processor
            .process(&request)
            .await
            .with_context(|| format!("Failed to replay page for {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceTier, TierPrices};
    use chrono::Utc;

    fn observation(group: &str, url: &str, gut: u32) -> Observation {
        Observation::new(group, url, "name", Utc::now(), TierPrices::from_slots([Some(gut), None, None, None]))
    }

    #[test]
    fn recording_matches_full_aggregation() {
        let mut state = TrackerState::default();
        for o in [
            observation("S22", "a", 400),
            observation("S21", "b", 300),
            observation("S22", "c", 350),
            observation("S21", "d", 310),
        ] {
            state.record(o);
        }

        assert_eq!(state.summaries, aggregate(&state.history));
        assert_eq!(state.summaries[0].tier(PriceTier::Gut).price, 350);
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = PassReport::default();
        report.tally(&Ok(ProcessOutcome::Recorded(observation("S21", "a", 1))));
        report.tally(&Ok(ProcessOutcome::Skipped(
            crate::application::page_processor::SkipReason::MissingTitle,
        )));
        report.tally(&Err(crate::infrastructure::ProcessingError::fetch("u", "down")));

        assert_eq!((report.recorded, report.skipped, report.failed), (1, 1, 1));
    }
}
