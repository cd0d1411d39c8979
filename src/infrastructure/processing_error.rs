//! Error types for page processing and ledger storage
//!
//! Page classification outcomes that merely delay (soft blocks, site error
//! pages) or produce nothing (missing title / price block) are not errors;
//! they are reported through `ProcessOutcome`. Only conditions the caller
//! has to act on live here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ProcessingError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl ProcessingError {
    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the driver may move on to the next URL after this error
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch { .. } => true,
            Self::InvalidSelector { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `entry` counts data rows from 1, after the optional header
    #[error("Malformed entry {entry} in {}: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        entry: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;
pub type StorageResult<T> = Result<T, StorageError>;
