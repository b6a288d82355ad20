//! CSV-backed URL queue, one `urls.csv` per source.
//!
//! The queue file is owned jointly with the operator: rows get pasted in
//! from spreadsheets, re-ordered, and hand-edited between runs. Loading is
//! therefore forgiving (delimiter sniffing, junk rows dropped, unknown
//! statuses reset) while writing always produces the canonical
//! comma-delimited form.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use url::Url;

use crate::models::{EntryStatus, PayloadStatus, QueueEntry, QueueState, SourceConfig};

use super::{validate_source_name, write_atomic, StoreError, StoreLock};

/// Column order of `urls.csv`. Loading tolerates missing trailing columns;
/// writing always emits all of them.
const CSV_HEADER: [&str; 11] = [
    "url",
    "status",
    "last_run_at",
    "error",
    "notes",
    "created_string_id",
    "created_url",
    "payload_status",
    "payload_text_chars",
    "payload_links",
    "payload_images",
];

/// Outcome of adding a batch of URLs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddReport {
    pub added: usize,
    pub duplicate: usize,
    pub invalid: usize,
}

/// Queue and per-source config storage rooted at a `sources/` directory.
pub struct QueueStore {
    root: PathBuf,
    lock: Arc<dyn StoreLock>,
}

impl QueueStore {
    pub fn new(root: impl Into<PathBuf>, lock: Arc<dyn StoreLock>) -> Self {
        Self {
            root: root.into(),
            lock,
        }
    }

    pub fn source_dir(&self, source: &str) -> PathBuf {
        self.root.join(source)
    }

    fn urls_path(&self, source: &str) -> PathBuf {
        self.source_dir(source).join("urls.csv")
    }

    fn config_path(&self, source: &str) -> PathBuf {
        self.source_dir(source).join("config.json")
    }

    /// Create the source directory layout if it does not exist yet.
    pub fn ensure_source(&self, source: &str) -> Result<PathBuf, StoreError> {
        validate_source_name(source)?;
        let dir = self.source_dir(source);
        let results = dir.join("results");
        fs::create_dir_all(&results).map_err(|e| StoreError::io(&results, e))?;
        Ok(dir)
    }

    /// Source directories present under the root, in sorted order.
    pub fn list_sources(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };
        let mut sources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && validate_source_name(&name).is_ok() {
                sources.push(name);
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Load all queue entries. Reads are lock-free; writes are atomic
    /// renames, so a reader sees either the old file or the new one.
    pub fn load_entries(&self, source: &str) -> Result<Vec<QueueEntry>, StoreError> {
        validate_source_name(source)?;
        self.read_entries_file(source)
    }

    /// Rewrite the whole queue file under the lock.
    pub fn save_entries(&self, source: &str, entries: &[QueueEntry]) -> Result<(), StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "urls")?;
        self.write_entries_file(source, entries)
    }

    /// Add URLs to the queue as pending entries. Already-queued URLs and
    /// strings that do not parse as http(s) URLs are counted but not added.
    pub fn add_urls(&self, source: &str, urls: &[String]) -> Result<AddReport, StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "urls")?;

        let mut entries = self.read_entries_file(source)?;
        let mut existing: HashSet<String> = entries.iter().map(|e| e.url.clone()).collect();
        let mut report = AddReport::default();

        for raw in urls {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !is_queueable_url(trimmed) {
                report.invalid += 1;
                continue;
            }
            if existing.insert(trimmed.to_string()) {
                entries.push(QueueEntry::new(trimmed));
                report.added += 1;
            } else {
                report.duplicate += 1;
            }
        }

        if report.added > 0 {
            self.write_entries_file(source, &entries)?;
        }
        Ok(report)
    }

    /// Claim the first queued entry for processing. Stamps `last_run_at`
    /// and clears any error left over from a previous attempt.
    pub fn claim_next(&self, source: &str) -> Result<Option<QueueEntry>, StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "urls")?;

        let mut entries = self.read_entries_file(source)?;
        let Some(entry) = entries
            .iter_mut()
            .find(|e| e.status == EntryStatus::Queued)
        else {
            return Ok(None);
        };

        entry.status = EntryStatus::Processing;
        entry.last_run_at = Utc::now().to_rfc3339();
        entry.error.clear();
        let claimed = entry.clone();

        self.write_entries_file(source, &entries)?;
        Ok(Some(claimed))
    }

    /// Replace the entry with the same URL, or append if it is new.
    pub fn update_entry(&self, source: &str, updated: &QueueEntry) -> Result<(), StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "urls")?;

        let mut entries = self.read_entries_file(source)?;
        match entries.iter_mut().find(|e| e.url == updated.url) {
            Some(slot) => *slot = updated.clone(),
            None => entries.push(updated.clone()),
        }
        self.write_entries_file(source, &entries)
    }

    /// Move pending, errored, and skipped entries back to queued, up to
    /// `limit`. Returns how many moved.
    pub fn requeue(&self, source: &str, limit: Option<usize>) -> Result<usize, StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "urls")?;

        let mut entries = self.read_entries_file(source)?;
        let mut moved = 0usize;
        for entry in entries.iter_mut() {
            if limit.is_some_and(|max| moved >= max) {
                break;
            }
            if entry.status.is_requeueable() {
                entry.status = EntryStatus::Queued;
                entry.error.clear();
                moved += 1;
            }
        }

        if moved > 0 {
            self.write_entries_file(source, &entries)?;
        }
        Ok(moved)
    }

    /// Entry counts per status, in canonical status order.
    pub fn status_counts(&self, source: &str) -> Result<Vec<(EntryStatus, usize)>, StoreError> {
        let entries = self.load_entries(source)?;
        let order = [
            EntryStatus::Pending,
            EntryStatus::Queued,
            EntryStatus::Processing,
            EntryStatus::Done,
            EntryStatus::Normalized,
            EntryStatus::Error,
            EntryStatus::Skipped,
        ];
        Ok(order
            .iter()
            .map(|status| {
                let count = entries.iter().filter(|e| e.status == *status).count();
                (*status, count)
            })
            .collect())
    }

    /// Load the source config, falling back to defaults when the file is
    /// missing. A present-but-unreadable file is an error, not a default.
    pub fn load_config(&self, source: &str) -> Result<SourceConfig, StoreError> {
        validate_source_name(source)?;
        self.read_config_file(source)
    }

    pub fn save_config(&self, source: &str, config: &SourceConfig) -> Result<(), StoreError> {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "config")?;
        self.write_config_file(source, config)
    }

    /// Read-modify-write the queue state section of the config under the
    /// lock, returning the updated config.
    pub fn update_state<F>(&self, source: &str, f: F) -> Result<SourceConfig, StoreError>
    where
        F: FnOnce(&mut QueueState),
    {
        let dir = self.ensure_source(source)?;
        let _guard = self.lock.acquire(&dir, "config")?;

        let mut config = self.read_config_file(source)?;
        f(&mut config.queue);
        self.write_config_file(source, &config)?;
        Ok(config)
    }

    fn read_entries_file(&self, source: &str) -> Result<Vec<QueueEntry>, StoreError> {
        let path = self.urls_path(source);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let delimiter = sniff_delimiter(raw.lines().next().unwrap_or(""));
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_bytes());

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for record in reader.records() {
            let record = record.map_err(|e| StoreError::decode(&path, e.to_string()))?;
            let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

            let url = field(0);
            if url.is_empty() || url.eq_ignore_ascii_case("url") {
                continue;
            }
            if !is_queueable_url(&url) {
                debug!("Dropping queue row with unusable URL: {}", url);
                continue;
            }
            if !seen.insert(url.clone()) {
                continue;
            }

            entries.push(QueueEntry {
                url,
                status: EntryStatus::parse_lossy(&field(1)),
                last_run_at: field(2),
                error: field(3),
                notes: field(4),
                created_string_id: field(5),
                created_url: field(6),
                payload_status: record
                    .get(7)
                    .and_then(|s| PayloadStatus::from_str(s.trim())),
                payload_text_chars: record.get(8).and_then(|s| s.trim().parse().ok()),
                payload_links: record.get(9).and_then(|s| s.trim().parse().ok()),
                payload_images: record.get(10).and_then(|s| s.trim().parse().ok()),
            });
        }
        Ok(entries)
    }

    fn write_entries_file(&self, source: &str, entries: &[QueueEntry]) -> Result<(), StoreError> {
        let path = self.urls_path(source);
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| StoreError::encode(&path, e.to_string()))?;

        for entry in entries {
            let payload_status = entry
                .payload_status
                .map(|s| s.as_str().to_string())
                .unwrap_or_default();
            let text_chars = entry
                .payload_text_chars
                .map(|v| v.to_string())
                .unwrap_or_default();
            let links = entry
                .payload_links
                .map(|v| v.to_string())
                .unwrap_or_default();
            let images = entry
                .payload_images
                .map(|v| v.to_string())
                .unwrap_or_default();

            writer
                .write_record([
                    entry.url.as_str(),
                    entry.status.as_str(),
                    entry.last_run_at.as_str(),
                    entry.error.as_str(),
                    entry.notes.as_str(),
                    entry.created_string_id.as_str(),
                    entry.created_url.as_str(),
                    payload_status.as_str(),
                    text_chars.as_str(),
                    links.as_str(),
                    images.as_str(),
                ])
                .map_err(|e| StoreError::encode(&path, e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::encode(&path, e.to_string()))?;
        write_atomic(&path, &bytes)
    }

    fn read_config_file(&self, source: &str) -> Result<SourceConfig, StoreError> {
        let path = self.config_path(source);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SourceConfig::default()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::decode(&path, e.to_string()))
    }

    fn write_config_file(&self, source: &str, config: &SourceConfig) -> Result<(), StoreError> {
        let path = self.config_path(source);
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| StoreError::encode(&path, e.to_string()))?;
        write_atomic(&path, json.as_bytes())
    }
}

/// Queue rows must be absolute http(s) URLs.
fn is_queueable_url(raw: &str) -> bool {
    matches!(Url::parse(raw), Ok(u) if matches!(u.scheme(), "http" | "https"))
}

/// Pick the column delimiter from the first line of the file. Spreadsheet
/// exports in some locales use `;` or tabs.
fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') {
        b';'
    } else if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DedupKey, PayloadStatus};
    use crate::store::NoopLock;
    use tempfile::TempDir;

    fn store() -> (TempDir, QueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("sources"), Arc::new(NoopLock));
        (dir, store)
    }

    #[test]
    fn test_add_and_load_roundtrip() {
        let (_dir, store) = store();
        let report = store
            .add_urls(
                "projects",
                &[
                    "https://example.com/a".to_string(),
                    "https://example.com/b".to_string(),
                ],
            )
            .unwrap();
        assert_eq!(report.added, 2);

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "https://example.com/a");
        assert_eq!(entries[0].status, EntryStatus::Pending);
    }

    #[test]
    fn test_add_counts_duplicates_and_invalid() {
        let (_dir, store) = store();
        store
            .add_urls("projects", &["https://example.com/a".to_string()])
            .unwrap();
        let report = store
            .add_urls(
                "projects",
                &[
                    "https://example.com/a".to_string(),
                    "not a url".to_string(),
                    "ftp://example.com/file".to_string(),
                    "https://example.com/c".to_string(),
                ],
            )
            .unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.duplicate, 1);
        assert_eq!(report.invalid, 2);
    }

    #[test]
    fn test_header_written_exactly() {
        let (dir, store) = store();
        store
            .add_urls("projects", &["https://example.com/a".to_string()])
            .unwrap();
        let raw = fs::read_to_string(dir.path().join("sources/projects/urls.csv")).unwrap();
        assert_eq!(
            raw.lines().next().unwrap(),
            "url,status,last_run_at,error,notes,created_string_id,created_url,\
             payload_status,payload_text_chars,payload_links,payload_images"
        );
    }

    #[test]
    fn test_loads_semicolon_delimited_file() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/urls.csv"),
            "url;status;last_run_at\nhttps://example.com/a;done;\nhttps://example.com/b;;\n",
        )
        .unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, EntryStatus::Done);
        assert_eq!(entries[1].status, EntryStatus::Pending);
    }

    #[test]
    fn test_loads_tab_delimited_file() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/urls.csv"),
            "url\tstatus\nhttps://example.com/a\tqueued\n",
        )
        .unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Queued);
    }

    #[test]
    fn test_junk_rows_are_dropped() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/urls.csv"),
            "url,status\nnot-a-url,pending\nftp://example.com/f,pending\n,\nhttps://example.com/ok,pending\n",
        )
        .unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://example.com/ok");
    }

    #[test]
    fn test_unknown_status_resets_to_pending() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/urls.csv"),
            "url,status\nhttps://example.com/a,bananas\n",
        )
        .unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries[0].status, EntryStatus::Pending);
    }

    #[test]
    fn test_duplicate_rows_keep_first() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/urls.csv"),
            "url,status\nhttps://example.com/a,done\nhttps://example.com/a,pending\n",
        )
        .unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Done);
    }

    #[test]
    fn test_payload_columns_roundtrip() {
        let (_dir, store) = store();
        let mut entry = QueueEntry::new("https://example.com/a");
        entry.status = EntryStatus::Normalized;
        entry.payload_status = Some(PayloadStatus::Weak);
        entry.payload_text_chars = Some(240);
        entry.payload_links = Some(4);
        entry.payload_images = Some(1);
        store.update_entry("projects", &entry).unwrap();

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries[0], entry);
    }

    #[test]
    fn test_claim_next_stamps_and_clears() {
        let (_dir, store) = store();
        let mut entry = QueueEntry::new("https://example.com/a");
        entry.status = EntryStatus::Queued;
        entry.error = "transport_error: old failure".to_string();
        store.update_entry("projects", &entry).unwrap();

        let claimed = store.claim_next("projects").unwrap().unwrap();
        assert_eq!(claimed.status, EntryStatus::Processing);
        assert!(!claimed.last_run_at.is_empty());
        assert!(claimed.error.is_empty());

        // Nothing left to claim.
        assert!(store.claim_next("projects").unwrap().is_none());
    }

    #[test]
    fn test_requeue_moves_eligible_statuses() {
        let (_dir, store) = store();
        for (url, status) in [
            ("https://example.com/a", EntryStatus::Pending),
            ("https://example.com/b", EntryStatus::Error),
            ("https://example.com/c", EntryStatus::Skipped),
            ("https://example.com/d", EntryStatus::Done),
        ] {
            let mut entry = QueueEntry::new(url);
            entry.status = status;
            store.update_entry("projects", &entry).unwrap();
        }

        let moved = store.requeue("projects", None).unwrap();
        assert_eq!(moved, 3);

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries[0].status, EntryStatus::Queued);
        assert_eq!(entries[3].status, EntryStatus::Done);
    }

    #[test]
    fn test_requeue_respects_limit() {
        let (_dir, store) = store();
        for url in ["https://example.com/a", "https://example.com/b"] {
            store.update_entry("projects", &QueueEntry::new(url)).unwrap();
        }
        let moved = store.requeue("projects", Some(1)).unwrap();
        assert_eq!(moved, 1);

        let entries = store.load_entries("projects").unwrap();
        assert_eq!(entries[0].status, EntryStatus::Queued);
        assert_eq!(entries[1].status, EntryStatus::Pending);
    }

    #[test]
    fn test_missing_config_defaults() {
        let (_dir, store) = store();
        let config = store.load_config("projects").unwrap();
        assert_eq!(config, SourceConfig::default());
    }

    #[test]
    fn test_partial_config_file_merges() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(
            dir.path().join("sources/projects/config.json"),
            r#"{"queue": {"paused": true}, "dedup_key": "fetched"}"#,
        )
        .unwrap();

        let config = store.load_config("projects").unwrap();
        assert!(config.queue.paused);
        assert!(config.queue.persist);
        assert_eq!(config.dedup_key, DedupKey::Fetched);
        assert_eq!(config.payload.min_text_chars, 600);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let (dir, store) = store();
        store.ensure_source("projects").unwrap();
        fs::write(dir.path().join("sources/projects/config.json"), "{nope").unwrap();
        assert!(matches!(
            store.load_config("projects"),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn test_update_state_persists() {
        let (_dir, store) = store();
        let config = store
            .update_state("projects", |queue| {
                queue.paused = true;
                queue.remaining = Some(5);
            })
            .unwrap();
        assert!(config.queue.paused);

        let reloaded = store.load_config("projects").unwrap();
        assert!(reloaded.queue.paused);
        assert_eq!(reloaded.queue.remaining, Some(5));
    }

    #[test]
    fn test_invalid_source_name_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load_entries("../etc"),
            Err(StoreError::InvalidSourceName(_))
        ));
    }

    #[test]
    fn test_list_sources() {
        let (_dir, store) = store();
        store.ensure_source("beta").unwrap();
        store.ensure_source("alpha").unwrap();
        assert_eq!(store.list_sources().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_delimiter_sniffing() {
        assert_eq!(sniff_delimiter("url;status"), b';');
        assert_eq!(sniff_delimiter("url\tstatus"), b'\t');
        assert_eq!(sniff_delimiter("url,status"), b',');
        assert_eq!(sniff_delimiter("https://example.com/a"), b',');
    }
}
