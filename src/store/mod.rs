//! Flat-file persistence for queues, results, and worker state.
//!
//! Everything lives under a `sources/` directory, one subdirectory per
//! source. Files are human-editable on purpose: the queue is CSV, the rest
//! is pretty-printed JSON. All writes go through a temp-file-and-rename so
//! a crash mid-write never leaves a half-written file behind, and mutating
//! operations serialize through a lock.

mod heartbeat;
mod lock;
mod queue;
mod results;

pub use heartbeat::HeartbeatFile;
pub use lock::{FileLock, LockGuard, NoopLock, StoreLock};
pub use queue::{AddReport, QueueStore};
pub use results::{is_result_key, result_key, ResultStore};

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid source name: {0:?} (allowed: 1-64 chars of letters, digits, '-', '_')")]
    InvalidSourceName(String),
    #[error("could not acquire {name} lock after {waited_ms}ms")]
    LockTimeout { name: String, waited_ms: u64 },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("could not encode {path}: {message}")]
    Encode { path: String, message: String },
    #[error("invalid result key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn decode(path: &Path, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    fn encode(path: &Path, message: impl Into<String>) -> Self {
        Self::Encode {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

/// Source names become directory names, so they are restricted to a safe
/// alphabet and a sane length.
pub fn validate_source_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidSourceName(name.to_string()))
    }
}

/// Write a file via a sibling temp file and rename, syncing before the
/// rename so the destination is never observed half-written.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(bytes)
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}
