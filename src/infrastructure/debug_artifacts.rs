//! Raw pages that could not be parsed, kept on disk for inspection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::processing_error::{StorageError, StorageResult};
use crate::domain::format_timestamp;
use crate::domain::services::{ArtifactReason, ArtifactSink};

/// `<timestamp>-<url>` with every character outside `[A-Za-z0-9_]` replaced by `-`
pub fn artifact_stem(observed_at: DateTime<Utc>, url: &str) -> String {
    format!("{}-{}", format_timestamp(observed_at), url)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}

/// Writes artifacts as `<dir>/<reason prefix><stem>.html`
#[derive(Debug, Clone)]
pub struct FileArtifactSink {
    dir: PathBuf,
}

impl FileArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))
    }

    pub fn artifact_path(&self, reason: ArtifactReason, observed_at: DateTime<Utc>, url: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.html", reason.prefix(), artifact_stem(observed_at, url)))
    }
}

#[async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn persist(
        &self,
        reason: ArtifactReason,
        observed_at: DateTime<Utc>,
        url: &str,
        body: &str,
    ) -> StorageResult<PathBuf> {
        self.ensure_dir().await?;
        let path = self.artifact_path(reason, observed_at, url);
        fs::write(&path, body)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        info!("Saved debug page to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 11, 20, 42, 28).unwrap() + chrono::Duration::milliseconds(735)
    }

    #[test]
    fn stem_replaces_every_non_word_character() {
        assert_eq!(
            artifact_stem(at(), "https://www.backmarket.de/de-de/p/s21?x=1"),
            "2024-11-11T20-42-28-735Z-https---www-backmarket-de-de-de-p-s21-x-1"
        );
    }

    #[tokio::test]
    async fn persist_writes_prefixed_file() {
        let dir = TempDir::new().unwrap();
        let sink = FileArtifactSink::new(dir.path().join("debug"));

        let path = sink
            .persist(ArtifactReason::NoPriceBlock, at(), "https://example.org/a", "<html/>")
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("no-quality-found-2024-11-11T20-42-28-735Z-"));
        assert!(name.ends_with(".html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html/>");
    }
}
