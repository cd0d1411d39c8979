//! Price tiers and euro amount parsing
//!
//! A listing page offers the same device in four condition grades. Each grade
//! is a tier with its own price; a grade that is sold out has no price at all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of condition grades tracked per listing
pub const TIER_COUNT: usize = 4;

/// Condition grade of a refurbished device, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Gut,
    SehrGut,
    Hervorragend,
    Premium,
}

impl PriceTier {
    /// All tiers in positional (column) order
    pub const ALL: [Self; TIER_COUNT] = [Self::Gut, Self::SehrGut, Self::Hervorragend, Self::Premium];

    /// Column name used in the history and summary files
    pub const fn column(self) -> &'static str {
        match self {
            Self::Gut => "gut",
            Self::SehrGut => "sehr_gut",
            Self::Hervorragend => "hervorragend",
            Self::Premium => "premium",
        }
    }

    /// Zero-based slot of this tier on a listing page
    pub const fn index(self) -> usize {
        match self {
            Self::Gut => 0,
            Self::SehrGut => 1,
            Self::Hervorragend => 2,
            Self::Premium => 3,
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Prices of the four tiers; `None` means sold out, never zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrices {
    pub gut: Option<u32>,
    pub sehr_gut: Option<u32>,
    pub hervorragend: Option<u32>,
    pub premium: Option<u32>,
}

impl TierPrices {
    /// Build from positional slots (gut, sehr_gut, hervorragend, premium)
    pub const fn from_slots(slots: [Option<u32>; TIER_COUNT]) -> Self {
        Self {
            gut: slots[0],
            sehr_gut: slots[1],
            hervorragend: slots[2],
            premium: slots[3],
        }
    }

    /// Map the raw tier texts of a listing page onto tier slots.
    ///
    /// The first four texts are matched to the tiers by position. A text that
    /// holds no amount marks a sold-out tier and leaves only that slot empty;
    /// it never pulls the following tiers forward. Texts after the fourth are
    /// ignored.
    ///
    /// Slots are deliberately not compacted. Shifting the remaining prices
    /// left would file each of them under a cheaper condition than the one
    /// the page offered it for.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut slots = [None; TIER_COUNT];
        for (slot, text) in slots.iter_mut().zip(texts) {
            *slot = parse_euros(text.as_ref());
        }
        Self::from_slots(slots)
    }

    pub const fn get(&self, tier: PriceTier) -> Option<u32> {
        match tier {
            PriceTier::Gut => self.gut,
            PriceTier::SehrGut => self.sehr_gut,
            PriceTier::Hervorragend => self.hervorragend,
            PriceTier::Premium => self.premium,
        }
    }

    pub const fn as_slots(&self) -> [Option<u32>; TIER_COUNT] {
        [self.gut, self.sehr_gut, self.hervorragend, self.premium]
    }

    /// Number of tiers that are in stock
    pub fn available(&self) -> usize {
        self.as_slots().iter().flatten().count()
    }
}

/// Parse a euro amount such as `"1.234,56 €"` into whole euros.
///
/// Only digits and commas are kept; the first comma becomes the decimal
/// point and the value is rounded to the nearest euro. Text without digits
/// (for example a sold-out label) yields `None`.
pub fn parse_euros(text: &str) -> Option<u32> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();

    if !kept.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let normalized = kept.replacen(',', ".", 1);
    let value: f64 = normalized.parse().ok()?;
    let rounded = value.round();

    if !rounded.is_finite() || rounded < 0.0 || rounded > f64::from(u32::MAX) {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = rounded as u32;
    Some(whole)
}
