//! Application layer module
//!
//! Orchestrates page processing and the crawl passes on top of the domain
//! and infrastructure layers.

pub mod page_processor;
pub mod tracker;

pub use page_processor::{PageProcessor, PageRequest, ProcessOutcome, RetryReason, SkipReason};
pub use tracker::{PassReport, PriceTracker, TrackerState};
