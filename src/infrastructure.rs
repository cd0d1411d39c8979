//! Infrastructure layer - External concerns and implementations
//!
//! Configuration, logging, HTTP fetching, page classification and the
//! ledger files live here; each module is its own file in infrastructure/.

pub mod config;
pub mod csv_store;
pub mod debug_artifacts;
pub mod html_parser;
pub mod http_client;
pub mod logging;
pub mod processing_error;

pub use config::{
    backmarket, defaults, AppConfig, ConfigManager, CooldownConfig, CrawlConfig, HttpConfig,
    LoggingConfig, ProductGroup, SiteConfig, StorageConfig,
};
pub use csv_store::{HistoryStore, SummaryStore};
pub use debug_artifacts::FileArtifactSink;
pub use html_parser::{ListingPageExtractor, PageClassification};
pub use http_client::HttpClient;
pub use logging::init_logging_with_config;
pub use processing_error::{ProcessingError, ProcessingResult, StorageError, StorageResult};
