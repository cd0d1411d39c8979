//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `PRICE_TRACKER__SECTION__KEY` environment variables. The resulting
//! `AppConfig` is validated once and passed by value from then on.

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Selectors and markers of the listing site
    pub site: SiteConfig,

    /// Back-off and pacing delays
    pub cooldowns: CooldownConfig,

    /// Ledger and debug artifact locations
    pub storage: StorageConfig,

    pub http: HttpConfig,

    pub logging: LoggingConfig,

    pub crawl: CrawlConfig,

    /// Product groups to track, in crawl order
    pub catalog: Vec<ProductGroup>,
}

/// How a listing page is recognized and taken apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// CSS selector of the product name heading
    pub title_selector: String,

    /// CSS selector of the element whose children carry the tier prices
    pub tier_container_selector: String,

    /// Substring of the raw page that marks an anti-bot challenge
    pub bot_challenge_marker: String,

    /// Substring of the title that marks a transient site error page
    pub site_error_banner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Pause after an anti-bot challenge before retrying the same page
    pub soft_block_seconds: u64,

    /// Pause after a site error page before retrying the same page
    pub site_error_seconds: u64,

    /// Delay before every fetch except the first one of a pass
    pub request_pacing_ms: u64,

    /// Pause between two passes in watch mode
    pub cycle_pause_seconds: u64,

    /// Retries granted to a replayed (captured) page that classifies as a
    /// soft block or site error
    pub replay_retry_limit: u32,
}

impl CooldownConfig {
    pub const fn soft_block(&self) -> Duration {
        Duration::from_secs(self.soft_block_seconds)
    }

    pub const fn site_error(&self) -> Duration {
        Duration::from_secs(self.site_error_seconds)
    }

    pub const fn request_pacing(&self) -> Duration {
        Duration::from_millis(self.request_pacing_ms)
    }

    pub const fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only observation ledger
    pub history_file: PathBuf,

    /// Per-group best prices, rewritten after every observation
    pub summary_file: PathBuf,

    /// Directory receiving pages that could not be parsed
    pub debug_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
    /// Keep cookies set by the site across requests
    pub cookie_store: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory holding the log file
    pub log_dir: PathBuf,

    pub file_name: String,

    /// Write the log file as JSON lines
    pub json_format: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Fetch all pages of a pass concurrently instead of one by one
    pub parallel: bool,
}

/// A product family and the listing pages that offer it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: String,
    pub urls: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            cooldowns: CooldownConfig::default(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            crawl: CrawlConfig::default(),
            catalog: backmarket::default_catalog(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title_selector: backmarket::TITLE_SELECTOR.to_string(),
            tier_container_selector: backmarket::TIER_CONTAINER_SELECTOR.to_string(),
            bot_challenge_marker: backmarket::BOT_CHALLENGE_MARKER.to_string(),
            site_error_banner: backmarket::SITE_ERROR_BANNER.to_string(),
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            soft_block_seconds: defaults::SOFT_BLOCK_SECONDS,
            site_error_seconds: defaults::SITE_ERROR_SECONDS,
            request_pacing_ms: defaults::REQUEST_PACING_MS,
            cycle_pause_seconds: defaults::CYCLE_PAUSE_SECONDS,
            replay_retry_limit: defaults::REPLAY_RETRY_LIMIT,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_file: PathBuf::from(defaults::HISTORY_FILE),
            summary_file: PathBuf::from(defaults::SUMMARY_FILE),
            debug_dir: PathBuf::from(defaults::DEBUG_DIR),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            follow_redirects: true,
            cookie_store: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: true,
            log_dir: PathBuf::from("."),
            file_name: defaults::LOG_FILE.to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Reject settings the crawler cannot work with
    pub fn validate(&self) -> Result<()> {
        let site = &self.site;
        for (name, value) in [
            ("site.title_selector", &site.title_selector),
            ("site.tier_container_selector", &site.tier_container_selector),
            ("site.bot_challenge_marker", &site.bot_challenge_marker),
            ("site.site_error_banner", &site.site_error_banner),
        ] {
            if value.trim().is_empty() {
                bail!("Configuration value {name} must not be empty");
            }
        }

        for group in &self.catalog {
            if group.id.trim().is_empty() {
                bail!("Catalog contains a product group without id");
            }
            if group.urls.is_empty() {
                bail!("Product group {} has no URLs", group.id);
            }
            for url in &group.urls {
                url::Url::parse(url)
                    .with_context(|| format!("Invalid URL in product group {}: {url}", group.id))?;
            }
        }

        Ok(())
    }

    /// Number of listing pages one pass visits
    pub fn page_count(&self) -> usize {
        self.catalog.iter().map(|g| g.urls.len()).sum()
    }
}

pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Manager for `price-tracker.json` in the working directory
    pub fn with_default_path() -> Self {
        Self::new(defaults::CONFIG_FILE)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Assemble defaults, the config file (if any) and environment overrides
    pub fn load_config(&self) -> Result<AppConfig> {
        let builtin = serde_json::to_string(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        if self.config_path.exists() {
            info!("Loading configuration from: {:?}", self.config_path);
        } else {
            debug!("No configuration file at {:?}, using defaults", self.config_path);
        }

        let settings = Config::builder()
            .add_source(File::from_str(&builtin, FileFormat::Json))
            .add_source(
                File::from(self.config_path.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config)
            .context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Write the default configuration unless a file already exists
    pub async fn initialize_on_first_run(&self) -> Result<AppConfig> {
        if self.config_path.exists() {
            info!("Configuration already present at {:?}", self.config_path);
            return self.load_config();
        }

        info!("🎉 First run detected - writing default configuration");
        let default_config = AppConfig::default();
        self.save_config(&default_config).await?;
        Ok(default_config)
    }
}

/// Back Market (de-de) page structure constants
pub mod backmarket {
    use super::ProductGroup;

    /// Product name heading
    pub const TITLE_SELECTOR: &str = r#"[data-test="container-wrapper"] .heading-1"#;

    /// Grid holding one entry per condition grade
    pub const TIER_CONTAINER_SELECTOR: &str =
        r".pt-0.md\:pt-24.py-72.md\:py-36 .grid.grid-cols-2.gap-x-12.list-none";

    /// Present anywhere in the body of an anti-bot challenge page
    pub const BOT_CHALLENGE_MARKER: &str = "bot-need-challenge";

    /// Heading shown instead of the product name when the shop fails
    pub const SITE_ERROR_BANNER: &str = "Oh Oh ... da ist wohl etwas schief gelaufen";

    const LISTING_BASE: &str = "https://www.backmarket.de/de-de/p/";

    const CATALOG: &[(&str, &[&str])] = &[
        (
            "S21",
            &[
                "samsung-galaxy-s21-5g-128-gb-grau-ohne-vertrag/15ad458f-c997-4391-ac91-0fa85a007129",
                "samsung-galaxy-s21-5g-128-gb-violett-ohne-vertrag/0400edf2-3e52-44e0-97b6-e2a5df70cbe4",
                "samsung-galaxy-s21-5g-256-gb-wei-ohne-vertrag/35e5898f-7d25-4ffc-aa47-ce2b43a445ca",
            ],
        ),
        (
            "S21 FE",
            &[
                "samsung-galaxy-s21-fe-5g-128-gb-grau-ohne-vertrag/1cc9e2d8-5763-46d5-9901-fcd072ae6eaf",
                "samsung-galaxy-s21-fe-5g-128-gb-wei-ohne-vertrag/58f90ccc-1ada-41b7-8e45-6090f989d263",
            ],
        ),
        (
            "S21 Ultra",
            &[
                "samsung-galaxy-s21-ultra-5g-128-gb-schwarz-midgnight-black-ohne-vertrag/eb82c373-e060-4ef3-b246-1f6564ebd8b7",
            ],
        ),
        (
            "S22",
            &[
                "samsung-galaxy-s22-5g-128-gb-grau-ohne-vertrag/dd462e1e-1dcc-40e0-818d-f9358c5e1459",
                "samsung-s22-128-gb-schwarz-ohne-vertrag/575510c6-6923-4af9-98cc-40ac222aa577",
                "samsung-galaxy-s22-5g-256-gb-grau-ohne-vertrag/67bd1dd0-2fc8-45f8-8a2c-c95508f73583",
            ],
        ),
        (
            "S22 Ultra",
            &[
                "samsung-galaxy-s22-ultra-5g-128-gb-wei-ohne-vertrag/90c2fb25-130f-47a5-8f32-4505d939f747",
                "samsung-galaxy-s22-ultra-5g-256-gb-rot-burgundy-red-ohne-vertrag/f6af9b7b-1787-4411-81de-da8fc4a0361b",
                "samsung-galaxy-s22-ultra-5g-256-gb-grun-ohne-vertrag/b3aad73b-302b-4227-bc0a-b95881a65431",
            ],
        ),
    ];

    /// Starter catalog written by `init`
    pub fn default_catalog() -> Vec<ProductGroup> {
        CATALOG
            .iter()
            .map(|(id, paths)| ProductGroup {
                id: (*id).to_string(),
                urls: paths.iter().map(|p| format!("{LISTING_BASE}{p}")).collect(),
            })
            .collect()
    }
}

/// Default configuration values
pub mod defaults {
    /// Config file looked up in the working directory
    pub const CONFIG_FILE: &str = "price-tracker.json";

    /// Prefix of environment overrides (`PRICE_TRACKER__COOLDOWNS__SOFT_BLOCK_SECONDS`)
    pub const ENV_PREFIX: &str = "PRICE_TRACKER";

    /// Two hours
    pub const SOFT_BLOCK_SECONDS: u64 = 7_200;

    /// Five minutes
    pub const SITE_ERROR_SECONDS: u64 = 300;

    pub const REQUEST_PACING_MS: u64 = 200;

    pub const CYCLE_PAUSE_SECONDS: u64 = 60;

    pub const REPLAY_RETRY_LIMIT: u32 = 1;

    pub const HISTORY_FILE: &str = "history.csv";

    pub const SUMMARY_FILE: &str = "stats.csv";

    pub const DEBUG_DIR: &str = "debug";

    pub const LOG_FILE: &str = "debug.log";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cooldowns.soft_block(), Duration::from_secs(7_200));
        assert_eq!(config.cooldowns.site_error(), Duration::from_secs(300));
        assert_eq!(config.storage.history_file, PathBuf::from("history.csv"));
        assert!(config.page_count() > 0);
    }

    #[test]
    fn validate_rejects_bad_catalog_entries() {
        let mut config = AppConfig::default();
        config.catalog = vec![ProductGroup {
            id: "S21".into(),
            urls: vec!["not a url".into()],
        }];
        assert!(config.validate().is_err());

        config.catalog = vec![ProductGroup {
            id: "S21".into(),
            urls: vec![],
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_selectors() {
        let mut config = AppConfig::default();
        config.site.title_selector = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("absent.json"));

        let config = manager.load_config().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("price-tracker.json"));

        let mut custom = AppConfig::default();
        custom.cooldowns.request_pacing_ms = 1_500;
        custom.crawl.parallel = true;
        custom.catalog = vec![ProductGroup {
            id: "S23".into(),
            urls: vec!["https://example.org/s23".into()],
        }];
        manager.save_config(&custom).await.unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.cooldowns.request_pacing_ms, 1_500);
        assert!(loaded.crawl.parallel);
        assert_eq!(loaded.catalog, custom.catalog);
    }

    #[tokio::test]
    async fn initialize_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("price-tracker.json"));

        let first = manager.initialize_on_first_run().await.unwrap();
        assert!(manager.config_path().exists());
        let second = manager.initialize_on_first_run().await.unwrap();
        assert_eq!(first, second);
    }
}
