//! Scripted collaborators and page builders for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;

use crate::domain::services::{ArtifactReason, ArtifactSink, PageFetcher, Sleeper};
use crate::infrastructure::processing_error::{ProcessingError, ProcessingResult, StorageResult};

/// Answers fetches from a fixed script and records every requested URL
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<ProcessingResult<String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new<I: IntoIterator<Item = String>>(pages: I) -> Self {
        Self {
            responses: Mutex::new(pages.into_iter().map(Ok).collect()),
            calls: Mutex::default(),
        }
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ProcessingError::fetch("scripted", message)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> ProcessingResult<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProcessingError::fetch(url, "script exhausted")))
    }
}

/// Returns immediately, remembering what it was asked to wait
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    persisted: Mutex<Vec<(ArtifactReason, String)>>,
}

impl RecordingSink {
    pub fn persisted(&self) -> Vec<(ArtifactReason, String)> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn persist(
        &self,
        reason: ArtifactReason,
        _observed_at: DateTime<Utc>,
        url: &str,
        _body: &str,
    ) -> StorageResult<PathBuf> {
        self.persisted.lock().unwrap().push((reason, url.to_string()));
        Ok(PathBuf::from(format!("{}{url}.html", reason.prefix())))
    }
}

/// Listing page with the given title and tier entries
pub fn listing_page(title: &str, tiers: &[&str]) -> String {
    let items: String = tiers.iter().map(|t| format!("<li>{t}</li>")).collect();
    format!(
        r#"<html><body>
            <div data-test="container-wrapper"><h1 class="heading-1">{title}</h1></div>
            <div class="pt-0 md:pt-24 py-72 md:py-36">
                <ul class="grid grid-cols-2 gap-x-12 list-none">{items}</ul>
            </div>
        </body></html>"#
    )
}

pub fn bot_challenge_page() -> String {
    r#"<html><body><div id="bot-need-challenge"></div></body></html>"#.to_string()
}

pub fn site_error_page() -> String {
    listing_page("Oh Oh ... da ist wohl etwas schief gelaufen", &[])
}

pub fn untitled_page() -> String {
    "<html><body><p>nothing here</p></body></html>".to_string()
}

pub fn page_without_tiers(title: &str) -> String {
    format!(r#"<div data-test="container-wrapper"><h1 class="heading-1">{title}</h1></div>"#)
}

/// Collects formatted log output of the current thread
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route this thread's events here until the guard drops
    pub fn set_default(&self) -> DefaultGuard {
        let capture = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buf.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
