//! Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use refurb_price_tracker_lib::domain::{PageFetcher, Sleeper};
use refurb_price_tracker_lib::infrastructure::{
    AppConfig, ProcessingError, ProcessingResult, ProductGroup,
};

/// Serves a fixed page per URL; unknown URLs fail like a dead connection
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    hits: Mutex<Vec<String>>,
}

impl StaticSite {
    pub fn with_page(mut self, url: &str, body: String) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticSite {
    async fn fetch(&self, url: &str) -> ProcessingResult<String> {
        self.hits.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ProcessingError::fetch(url, "connection refused"))
    }
}

#[derive(Default)]
pub struct InstantSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Default config with all files under `dir` and the given catalog
pub fn config_in(dir: &Path, catalog: &[(&str, &[&str])]) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.history_file = dir.join("history.csv");
    config.storage.summary_file = dir.join("stats.csv");
    config.storage.debug_dir = dir.join("debug");
    config.catalog = catalog
        .iter()
        .map(|(id, urls)| ProductGroup {
            id: (*id).to_string(),
            urls: urls.iter().map(ToString::to_string).collect(),
        })
        .collect();
    config
}

pub fn listing_page(title: &str, tiers: &[&str]) -> String {
    let items: String = tiers.iter().map(|t| format!("<li><span>{t}</span></li>")).collect();
    format!(
        r#"<!doctype html><html><body>
            <div data-test="container-wrapper"><h1 class="heading-1">{title}</h1></div>
            <div class="pt-0 md:pt-24 py-72 md:py-36">
                <ul class="grid grid-cols-2 gap-x-12 list-none">{items}</ul>
            </div>
        </body></html>"#
    )
}
