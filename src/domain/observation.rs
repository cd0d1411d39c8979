//! Price observations - one per successfully processed listing page

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::price_tier::{PriceTier, TierPrices};

/// One successful price extraction from one fetched page at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Caller-assigned product family label (e.g. "S22 Ultra")
    #[serde(rename = "id")]
    pub group_id: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub tier_prices: TierPrices,
}

impl Observation {
    pub fn new(
        group_id: impl Into<String>,
        source_url: impl Into<String>,
        display_name: impl Into<String>,
        observed_at: DateTime<Utc>,
        tier_prices: TierPrices,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            source_url: source_url.into(),
            display_name: display_name.into(),
            observed_at,
            tier_prices,
        }
    }

    pub const fn price(&self, tier: PriceTier) -> Option<u32> {
        self.tier_prices.get(tier)
    }

    /// ISO-8601 timestamp as written to the ledger files
    pub fn timestamp(&self) -> String {
        format_timestamp(self.observed_at)
    }
}

/// Format a UTC instant the way the ledger stores it: `2024-11-11T20:42:28.735Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Last path segment of a listing URL, used to identify pages in log lines
pub fn page_identifier(url: &str) -> &str {
    url.trim_end_matches(['/', '?'])
        .rsplit('/')
        .next()
        .unwrap_or(url)
}
