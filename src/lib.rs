//! Refurbished price tracker
//!
//! Scrapes tiered listing prices of refurbished devices, keeps an
//! append-only observation history and maintains the cheapest price ever
//! seen per product group and condition tier.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;
