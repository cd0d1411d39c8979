//! Logging system configuration and initialization
//!
//! Console output plus a non-blocking log file (`debug.log` by default),
//! both stamped with UTC ISO-8601 timestamps. `RUST_LOG` overrides the
//! configured level.

use anyhow::{Result, anyhow};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::Directive,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// `2024-11-11T20:42:28.735Z`
struct UtcIsoTimer;

impl FormatTime for UtcIsoTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Noisy dependencies are held back unless tracing is requested
const QUIET_DIRECTIVES: &[&str] = &[
    "reqwest=info",
    "hyper=warn",
    "hyper_util=warn",
    "h2=warn",
    "html5ever=warn",
    "selectors=warn",
];

/// `RUST_LOG` when set, the configured level otherwise
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for_level(&config.level))
}

/// Filter for a configured level; an unparsable level means `info`
fn filter_for_level(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    if !level.to_lowercase().contains("trace") {
        for directive in QUIET_DIRECTIVES {
            if let Ok(directive) = directive.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Install the global subscriber
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", config.log_dir, e))?;

        let file_appender = rolling::never(&config.log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(file_guard);
        }

        let layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(UtcIsoTimer)
                .with_target(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(UtcIsoTimer)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(UtcIsoTimer)
            .with_target(false)
    });

    Registry::default()
        .with(build_env_filter(config))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logging subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", config.log_dir.join(&config.file_name));
    }

    Ok(())
}
