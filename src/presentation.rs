//! Presentation persistence.
//!
//! A "presentation" is the public, normalized face of a harvested project.
//! The trait is the seam where a real backend (a database, an API) plugs in;
//! the shipped implementations are a JSON file for local operation and an
//! in-memory store for tests and dry runs.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::PresentationRef;
use crate::oracle::NormalizedProject;
use crate::store::{write_atomic, StoreLock};

/// Where normalized payloads end up, and how earlier ones are found again.
#[async_trait]
pub trait PresentationStore: Send + Sync {
    /// Find a presentation previously persisted for this canonical source
    /// URL, if any. This is what makes re-harvesting idempotent.
    async fn find_by_source_url(&self, url: &str) -> anyhow::Result<Option<PresentationRef>>;

    /// Persist a normalized payload, returning a handle to the stored copy.
    async fn persist(
        &self,
        payload: &NormalizedProject,
        source_url: &str,
        creator_id: &str,
    ) -> anyhow::Result<PresentationRef>;
}

/// One stored presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub string_id: String,
    pub source_url: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub payload: NormalizedProject,
}

/// Presentations as a single JSON array on disk.
pub struct JsonPresentationStore {
    path: PathBuf,
    lock: Arc<dyn StoreLock>,
}

impl JsonPresentationStore {
    pub fn new(path: impl Into<PathBuf>, lock: Arc<dyn StoreLock>) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    fn lock_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn read_records(&self) -> anyhow::Result<Vec<PresentationRecord>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write_records(&self, records: &[PresentationRecord]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl PresentationStore for JsonPresentationStore {
    async fn find_by_source_url(&self, url: &str) -> anyhow::Result<Option<PresentationRef>> {
        let records = self.read_records()?;
        Ok(records.iter().find(|r| r.source_url == url).map(|r| {
            PresentationRef {
                string_id: r.string_id.clone(),
                url: None,
            }
        }))
    }

    async fn persist(
        &self,
        payload: &NormalizedProject,
        source_url: &str,
        creator_id: &str,
    ) -> anyhow::Result<PresentationRef> {
        let dir = self.lock_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let _guard = self.lock.acquire(&dir, "presentations")?;

        let mut records = self.read_records()?;
        let record = PresentationRecord {
            string_id: Uuid::new_v4().to_string(),
            source_url: source_url.to_string(),
            creator_id: creator_id.to_string(),
            created_at: Utc::now(),
            payload: payload.clone(),
        };
        let handle = PresentationRef {
            string_id: record.string_id.clone(),
            url: None,
        };
        records.push(record);
        self.write_records(&records)?;
        Ok(handle)
    }
}

/// In-memory presentation store for tests and dry runs.
#[derive(Default)]
pub struct MemoryPresentationStore {
    records: Mutex<Vec<PresentationRecord>>,
    base_url: Option<String>,
}

impl MemoryPresentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out presentation URLs under `base_url`, the way a hosted
    /// backend would.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            base_url: Some(base_url.into()),
        }
    }

    pub async fn count(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn snapshot(&self) -> Vec<PresentationRecord> {
        self.records.lock().await.clone()
    }

    fn make_ref(&self, string_id: &str) -> PresentationRef {
        PresentationRef {
            string_id: string_id.to_string(),
            url: self
                .base_url
                .as_ref()
                .map(|base| format!("{}/{}", base.trim_end_matches('/'), string_id)),
        }
    }
}

#[async_trait]
impl PresentationStore for MemoryPresentationStore {
    async fn find_by_source_url(&self, url: &str) -> anyhow::Result<Option<PresentationRef>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.source_url == url)
            .map(|r| self.make_ref(&r.string_id)))
    }

    async fn persist(
        &self,
        payload: &NormalizedProject,
        source_url: &str,
        creator_id: &str,
    ) -> anyhow::Result<PresentationRef> {
        let mut records = self.records.lock().await;
        let record = PresentationRecord {
            string_id: Uuid::new_v4().to_string(),
            source_url: source_url.to_string(),
            creator_id: creator_id.to_string(),
            created_at: Utc::now(),
            payload: payload.clone(),
        };
        let handle = self.make_ref(&record.string_id);
        records.push(record);
        Ok(handle)
    }
}
