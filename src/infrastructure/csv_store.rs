//! Semicolon-separated ledger files
//!
//! `history.csv` is the append-only list of observations; `stats.csv` is the
//! derived per-group summary and is rewritten as a whole.

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::io::{self, Write};
use std::mem::take;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::processing_error::{StorageError, StorageResult};
use crate::domain::{Observation, PriceTier, Summary, TierPrices, TIER_COUNT};

pub const DELIMITER: char = ';';

/// Column order of the history file
pub const HISTORY_COLUMNS: [&str; 4 + TIER_COUNT] = [
    "id",
    "url",
    "name",
    "timestamp",
    "gut",
    "sehr_gut",
    "hervorragend",
    "premium",
];

/* ---------------- Parsing ---------------- */

/// Quote-aware row parser; tolerates CRLF and skips blank lines.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            c if c == DELIMITER && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                flush_row(&mut rows, &mut row);
            }
            _ => field.push(ch),
        }
    }

    row.push(field);
    flush_row(&mut rows, &mut row);

    rows
}

fn flush_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>) {
    if row.len() == 1 && row[0].is_empty() {
        row.clear();
    } else {
        rows.push(take(row));
    }
}

/* ---------------- Writing ---------------- */

fn needs_quotes(field: &str) -> bool {
    field.contains(DELIMITER) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single row, quoting fields that need it.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, "{DELIMITER}")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

fn render_rows<S: AsRef<str>>(path: &Path, rows: &[Vec<S>]) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    for row in rows {
        write_row(&mut buf, row).map_err(|e| StorageError::io(path, e))?;
    }
    Ok(buf)
}

/* ---------------- Row mapping ---------------- */

pub fn observation_to_row(observation: &Observation) -> Vec<String> {
    let mut row = vec![
        observation.group_id.clone(),
        observation.source_url.clone(),
        observation.display_name.clone(),
        observation.timestamp(),
    ];
    row.extend(
        PriceTier::ALL
            .iter()
            .map(|t| observation.price(*t).map(|p| p.to_string()).unwrap_or_default()),
    );
    row
}

fn row_to_observation(row: &[String]) -> Result<Observation, String> {
    if row.len() < HISTORY_COLUMNS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            HISTORY_COLUMNS.len(),
            row.len()
        ));
    }

    let observed_at = DateTime::parse_from_rfc3339(&row[3])
        .map_err(|e| format!("invalid timestamp {:?}: {e}", row[3]))?
        .with_timezone(&Utc);

    let mut slots = [None; TIER_COUNT];
    for (slot, cell) in slots.iter_mut().zip(&row[4..]) {
        if !cell.is_empty() {
            *slot = Some(
                cell.parse::<u32>()
                    .map_err(|e| format!("invalid price {cell:?}: {e}"))?,
            );
        }
    }

    Ok(Observation::new(
        row[0].as_str(),
        row[1].as_str(),
        row[2].as_str(),
        observed_at,
        TierPrices::from_slots(slots),
    ))
}

fn is_history_header(row: &[String]) -> bool {
    row.first().is_some_and(|c| c == HISTORY_COLUMNS[0])
}

/// Observations of a history file's text plus one error per rejected
/// entry. Entries are numbered from 1 after the optional header row.
fn decode_history(path: &Path, text: &str) -> (Vec<Observation>, Vec<StorageError>) {
    let mut rows = parse_rows(text);
    if rows.first().is_some_and(|r| is_history_header(r)) {
        rows.remove(0);
    }

    let mut observations = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match row_to_observation(row) {
            Ok(observation) => observations.push(observation),
            Err(reason) => rejected.push(StorageError::MalformedRow {
                path: path.to_path_buf(),
                entry: index + 1,
                reason,
            }),
        }
    }

    (observations, rejected)
}

async fn ensure_parent(path: &Path) -> StorageResult<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e)),
        None => Ok(()),
    }
}

/* ---------------- Stores ---------------- */

/// Append-only observation ledger
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every recorded observation.
    ///
    /// An absent file is created holding only the header line and read once
    /// more. An existing file is never rewritten here: bytes that are not
    /// valid UTF-8 are decoded lossily and any other read error is returned.
    /// Malformed rows are logged and skipped.
    pub async fn load(&self) -> StorageResult<Vec<Observation>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("History {:?} not found, creating it", self.path);
                self.create_empty().await?;
                fs::read(&self.path)
                    .await
                    .map_err(|e| StorageError::io(&self.path, e))?
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let text = String::from_utf8_lossy(&bytes);
        if let Cow::Owned(_) = text {
            warn!("History {:?} contains invalid UTF-8, replaced undecodable bytes", self.path);
        }

        let (observations, rejected) = decode_history(&self.path, &text);
        for err in &rejected {
            warn!("Skipping history entry: {}", err);
        }

        info!("Loaded {} observations from {:?}", observations.len(), self.path);
        Ok(observations)
    }

    /// Append one observation as a header-less row
    pub async fn append(&self, observation: &Observation) -> StorageResult<()> {
        self.append_all(std::slice::from_ref(observation)).await
    }

    pub async fn append_all(&self, observations: &[Observation]) -> StorageResult<()> {
        if observations.is_empty() {
            return Ok(());
        }

        let needs_header = fs::metadata(&self.path)
            .await
            .map_or(true, |m| m.len() == 0);

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(observations.len() + 1);
        if needs_header {
            rows.push(HISTORY_COLUMNS.iter().map(ToString::to_string).collect());
        }
        rows.extend(observations.iter().map(observation_to_row));
        let buf = render_rows(&self.path, &rows)?;

        ensure_parent(&self.path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.write_all(&buf)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&self.path, e))?;

        debug!("Appended {} rows to {:?}", observations.len(), self.path);
        Ok(())
    }

    async fn create_empty(&self) -> StorageResult<()> {
        ensure_parent(&self.path).await?;
        let buf = render_rows(&self.path, &[HISTORY_COLUMNS.to_vec()])?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        file.write_all(&buf)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&self.path, e))
    }
}

/// Fully rewritten per-group summary file
#[derive(Debug, Clone)]
pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, summaries: &[Summary]) -> StorageResult<()> {
        let mut rows = Vec::with_capacity(summaries.len() + 1);
        rows.push(Summary::columns());
        rows.extend(summaries.iter().map(Summary::to_row));
        let buf = render_rows(&self.path, &rows)?;

        ensure_parent(&self.path).await?;
        fs::write(&self.path, buf)
            .await
            .map_err(|e| StorageError::io(&self.path, e))?;

        debug!("Wrote {} summaries to {:?}", summaries.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn observation(name: &str) -> Observation {
        Observation::new(
            "S22 Ultra",
            "https://example.org/s22-ultra",
            name,
            Utc.with_ymd_and_hms(2024, 11, 11, 20, 42, 28).unwrap(),
            TierPrices::from_slots([Some(512), None, Some(580), Some(640)]),
        )
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_quotes() {
        let rows = parse_rows("a;\"b;c\";\"say \"\"hi\"\"\"\r\n\n1;2;3\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b;c".into(), "say \"hi\"".into()],
                vec!["1".to_string(), "2".into(), "3".into()],
            ]
        );
    }

    #[test]
    fn write_row_quotes_only_when_needed() {
        let mut buf = Vec::new();
        write_row(&mut buf, &["plain", "semi;colon", "quote\"d"][..]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "plain;\"semi;colon\";\"quote\"\"d\"\n");
    }

    #[test]
    fn absent_tiers_are_empty_fields() {
        assert_eq!(
            observation_to_row(&observation("Galaxy")),
            [
                "S22 Ultra",
                "https://example.org/s22-ultra",
                "Galaxy",
                "2024-11-11T20:42:28.000Z",
                "512",
                "",
                "580",
                "640"
            ]
        );
    }

    #[tokio::test]
    async fn load_creates_missing_file_with_header() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));

        let observations = store.load().await.unwrap();

        assert!(observations.is_empty());
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "id;url;name;timestamp;gut;sehr_gut;hervorragend;premium\n");
    }

    #[tokio::test]
    async fn appended_rows_are_read_back() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));
        store.load().await.unwrap();

        let entry = observation("Galaxy S22 Ultra; 256 GB");
        store.append(&entry).await.unwrap();
        store.append(&observation("second")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], entry);
    }

    #[tokio::test]
    async fn append_to_fresh_path_writes_header_first() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.csv"));

        store.append(&observation("x")).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("id;url;name;timestamp;"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        std::fs::write(
            &path,
            "id;url;name;timestamp;gut;sehr_gut;hervorragend;premium\n\
             S21;u;n;yesterday;1;;;\n\
             S21;u;n;2024-11-11T20:42:28.735Z;389;;;\n",
        )
        .unwrap();

        let loaded = HistoryStore::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].price(PriceTier::Gut), Some(389));
    }

    #[tokio::test]
    async fn invalid_utf8_history_is_read_and_left_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        let mut bytes = b"id;url;name;timestamp;gut;sehr_gut;hervorragend;premium\n\
            S21;u;Galaxy S21;2024-11-11T20:42:28.735Z;389;;;\n"
            .to_vec();
        bytes.extend_from_slice(b"S21;u;Gr\xfcn;2024-11-11T20:43:00.000Z;375;;;\n");
        std::fs::write(&path, &bytes).unwrap();

        let loaded = HistoryStore::new(&path).load().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].price(PriceTier::Gut), Some(375));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn unreadable_history_is_an_error_not_a_reset() {
        let dir = TempDir::new().unwrap();
        // a directory in place of the file cannot be read but must survive
        let path = dir.path().join("history.csv");
        std::fs::create_dir(&path).unwrap();

        let err = HistoryStore::new(&path).load().await.unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert!(path.is_dir());
    }

    #[test]
    fn rejected_entries_are_numbered_after_header_and_blank_lines() {
        let text = "id;url;name;timestamp;gut;sehr_gut;hervorragend;premium\n\
                    \n\
                    S21;u;n;2024-11-11T20:42:28.735Z;389;;;\n\
                    \n\
                    S21;u;n;yesterday;1;;;\n";

        let (observations, rejected) = decode_history(Path::new("history.csv"), text);

        assert_eq!(observations.len(), 1);
        assert!(matches!(rejected.as_slice(), [StorageError::MalformedRow { entry: 2, .. }]));

        let (_, headerless) = decode_history(Path::new("history.csv"), "S21;u;n;never;1;;;\n");
        assert!(matches!(headerless.as_slice(), [StorageError::MalformedRow { entry: 1, .. }]));
    }

    #[tokio::test]
    async fn summary_file_is_rewritten_with_header() {
        let dir = TempDir::new().unwrap();
        let store = SummaryStore::new(dir.path().join("stats.csv"));
        let summary = Summary {
            group_id: "S21".into(),
            url: "https://example.org/a".into(),
            tiers: Default::default(),
        };

        store.write(&[summary.clone(), summary.clone()]).await.unwrap();
        store.write(&[summary]).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        let rows = parse_rows(&text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Summary::columns());
        assert_eq!(rows[1][..3], ["S21", "https://example.org/a", "0"]);
    }
}
