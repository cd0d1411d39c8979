//! Running-minimum aggregation over the observation history
//!
//! Pure functions only: the same history always yields the same summaries,
//! so callers may recompute from any thread on an immutable snapshot.

use std::collections::HashMap;

use crate::domain::observation::Observation;
use crate::domain::price_tier::PriceTier;
use crate::domain::summary::{Summary, TierMinimum};

/// Compute one summary per product group, in first-seen group order.
pub fn aggregate(observations: &[Observation]) -> Vec<Summary> {
    partition_by_group(observations)
        .into_iter()
        .filter_map(|(group_id, entries)| summarize(group_id, &entries))
        .collect()
}

/// Compute the summary of a single group, or `None` if it has no observations.
pub fn aggregate_group(group_id: &str, observations: &[Observation]) -> Option<Summary> {
    let entries: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.group_id == group_id)
        .collect();
    summarize(group_id, &entries)
}

fn partition_by_group(observations: &[Observation]) -> Vec<(&str, Vec<&Observation>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&Observation>)> = Vec::new();

    for observation in observations {
        let key = observation.group_id.as_str();
        match index.get(key) {
            Some(&slot) => groups[slot].1.push(observation),
            None => {
                index.insert(key, groups.len());
                groups.push((key, vec![observation]));
            }
        }
    }

    groups
}

fn summarize(group_id: &str, entries: &[&Observation]) -> Option<Summary> {
    let first = entries.first()?;
    let tiers = PriceTier::ALL.map(|tier| lowest(entries, tier));

    Some(Summary {
        group_id: group_id.to_string(),
        url: first.source_url.clone(),
        tiers,
    })
}

/// Cheapest positive price for `tier`; the earliest entry wins ties.
fn lowest(entries: &[&Observation], tier: PriceTier) -> TierMinimum {
    let mut best: Option<(&Observation, u32)> = None;

    for entry in entries {
        let Some(price) = entry.price(tier).filter(|p| *p > 0) else {
            continue;
        };
        if best.is_none_or(|(_, current)| price < current) {
            best = Some((entry, price));
        }
    }

    best.map_or_else(TierMinimum::default, |(entry, price)| {
        TierMinimum::from_observation(entry, price)
    })
}
