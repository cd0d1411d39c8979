//! Best-price-ever summaries per product group

use serde::{Deserialize, Serialize};

use super::observation::Observation;
use super::price_tier::{PriceTier, TIER_COUNT};

/// Cheapest observation ever recorded for one tier, with provenance.
///
/// A tier that no observation ever reported keeps the placeholder
/// `price == 0` with empty timestamp, name and url.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMinimum {
    pub price: u32,
    pub timestamp: String,
    pub name: String,
    pub url: String,
}

impl TierMinimum {
    pub fn from_observation(observation: &Observation, price: u32) -> Self {
        Self {
            price,
            timestamp: observation.timestamp(),
            name: observation.display_name.clone(),
            url: observation.source_url.clone(),
        }
    }

    pub const fn is_placeholder(&self) -> bool {
        self.price == 0
    }
}

/// Derived view of one product group: running minimum for every tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "id")]
    pub group_id: String,
    /// URL of the group's first-ever observation
    pub url: String,
    pub tiers: [TierMinimum; TIER_COUNT],
}

impl Summary {
    pub fn tier(&self, tier: PriceTier) -> &TierMinimum {
        &self.tiers[tier.index()]
    }

    /// Column names of the summary file, in order
    pub fn columns() -> Vec<String> {
        let mut columns = vec!["id".to_string(), "url".to_string()];
        for tier in PriceTier::ALL {
            let name = tier.column();
            columns.push(name.to_string());
            columns.push(format!("{name}_timestamp"));
            columns.push(format!("{name}_name"));
            columns.push(format!("{name}_url"));
        }
        columns
    }

    /// One summary-file row, matching [`Summary::columns`]
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(2 + TIER_COUNT * 4);
        row.push(self.group_id.clone());
        row.push(self.url.clone());
        for minimum in &self.tiers {
            row.push(minimum.price.to_string());
            row.push(minimum.timestamp.clone());
            row.push(minimum.name.clone());
            row.push(minimum.url.clone());
        }
        row
    }
}
