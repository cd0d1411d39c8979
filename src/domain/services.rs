pub mod page_services;
pub mod stats_aggregator;

pub use page_services::{ArtifactReason, ArtifactSink, PageFetcher, Sleeper, TokioSleeper};
pub use stats_aggregator::{aggregate, aggregate_group};
