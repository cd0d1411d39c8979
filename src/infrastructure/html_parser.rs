//! Listing page classification
//!
//! Turns the raw text of a fetched listing page into a [`PageClassification`].
//! This is a pure function of the page and the site configuration; waiting,
//! retrying and artifact writing belong to the caller.

use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use super::config::SiteConfig;
use super::processing_error::{ProcessingError, ProcessingResult};

/// What a fetched page turned out to be, in decreasing priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageClassification {
    /// Anti-bot challenge instead of content
    SoftBlock,
    /// No product heading (or only whitespace)
    MissingTitle,
    /// The shop rendered its generic error page
    SiteError { title: String },
    /// Product heading present but the tier grid is not
    MissingPriceBlock { title: String },
    /// Regular listing with the raw text of every tier entry, in page order
    Listing { title: String, tier_texts: Vec<String> },
}

/// Compiled selectors and markers for one listing site
#[derive(Debug, Clone)]
pub struct ListingPageExtractor {
    title: Selector,
    tier_container: Selector,
    bot_challenge_marker: String,
    site_error_banner: String,
}

impl ListingPageExtractor {
    pub fn new(site: &SiteConfig) -> ProcessingResult<Self> {
        Ok(Self {
            title: compile(&site.title_selector)?,
            tier_container: compile(&site.tier_container_selector)?,
            bot_challenge_marker: site.bot_challenge_marker.clone(),
            site_error_banner: site.site_error_banner.clone(),
        })
    }

    pub fn classify(&self, raw: &str) -> PageClassification {
        if raw.contains(&self.bot_challenge_marker) {
            return PageClassification::SoftBlock;
        }

        let document = Html::parse_document(raw);

        let Some(title) = document
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
        else {
            return PageClassification::MissingTitle;
        };

        if title.contains(&self.site_error_banner) {
            return PageClassification::SiteError { title };
        }

        let Some(container) = document.select(&self.tier_container).next() else {
            return PageClassification::MissingPriceBlock { title };
        };

        let tier_texts: Vec<String> = container
            .children()
            .filter_map(ElementRef::wrap)
            .map(element_text)
            .collect();
        trace!("Found {} tier entries for {}", tier_texts.len(), title);

        PageClassification::Listing { title, tier_texts }
    }
}

fn compile(selector: &str) -> ProcessingResult<Selector> {
    Selector::parse(selector).map_err(|e| ProcessingError::invalid_selector(selector, e.to_string()))
}

/// Concatenated text of an element, with surrounding whitespace trimmed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
