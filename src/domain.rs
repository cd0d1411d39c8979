//! Domain module - Core price-tracking entities and computations
//!
//! Each module is its own file in the domain/ directory; commonly used
//! items are re-exported here for convenience.

pub mod observation;
pub mod price_tier;
pub mod services;
pub mod summary;

pub use observation::{format_timestamp, page_identifier, Observation};
pub use price_tier::{parse_euros, PriceTier, TierPrices, TIER_COUNT};
pub use services::{
    aggregate, aggregate_group, ArtifactReason, ArtifactSink, PageFetcher, Sleeper, TokioSleeper,
};
pub use summary::{Summary, TierMinimum};
