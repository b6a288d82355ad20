//! Per-URL harvest results, stored as JSON keyed by URL digest.
//!
//! The digest keeps filenames filesystem-safe regardless of what the URL
//! contains, and makes re-harvesting the same URL an overwrite instead of
//! an accumulation.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::models::HarvestResult;

use super::{validate_source_name, write_atomic, StoreError, StoreLock};

/// Filename key for a URL: lowercase hex SHA-1 of the exact URL string.
pub fn result_key(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn is_result_key(key: &str) -> bool {
    key.len() == 40 && key.chars().all(|c| c.is_ascii_hexdigit())
}

pub struct ResultStore {
    root: PathBuf,
    lock: Arc<dyn StoreLock>,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>, lock: Arc<dyn StoreLock>) -> Self {
        Self {
            root: root.into(),
            lock,
        }
    }

    fn results_dir(&self, source: &str) -> PathBuf {
        self.root.join(source).join("results")
    }

    /// Write the result for a URL, overwriting any previous attempt.
    /// Stamps `stored_at` on the way out.
    pub fn store(
        &self,
        source: &str,
        url: &str,
        result: &mut HarvestResult,
    ) -> Result<PathBuf, StoreError> {
        validate_source_name(source)?;
        let dir = self.results_dir(source);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        result.stored_at = Some(Utc::now());
        let path = dir.join(format!("{}.json", result_key(url)));
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| StoreError::encode(&path, e.to_string()))?;

        let _guard = self.lock.acquire(&dir, "results")?;
        write_atomic(&path, json.as_bytes())?;
        Ok(path)
    }

    pub fn load(&self, source: &str, url: &str) -> Result<Option<HarvestResult>, StoreError> {
        self.load_by_key(source, &result_key(url))
    }

    pub fn load_by_key(
        &self,
        source: &str,
        key: &str,
    ) -> Result<Option<HarvestResult>, StoreError> {
        validate_source_name(source)?;
        if !is_result_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let path = self.results_dir(source).join(format!("{}.json", key));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::decode(&path, e.to_string()))
    }

    pub fn has_result(&self, source: &str, url: &str) -> bool {
        self.results_dir(source)
            .join(format!("{}.json", result_key(url)))
            .exists()
    }

    /// Keys and storage times of all results for a source.
    pub fn list(&self, source: &str) -> Result<Vec<(String, Option<DateTime<Utc>>)>, StoreError> {
        validate_source_name(source)?;
        let dir = self.results_dir(source);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut results = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(key) = name.strip_suffix(".json") else {
                continue;
            };
            if !is_result_key(key) {
                continue;
            }
            let stored_at = self
                .load_by_key(source, key)?
                .and_then(|result| result.stored_at);
            results.push((key.to_string(), stored_at));
        }
        results.sort();
        Ok(results)
    }
}
