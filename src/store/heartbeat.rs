//! Worker heartbeat file.
//!
//! A single JSON file the queue worker rewrites before each claim. Liveness
//! is judged by readers from the timestamp alone, so a crashed worker needs
//! no cleanup to be reported dead.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::models::WorkerHeartbeat;

use super::{write_atomic, StoreError};

pub struct HeartbeatFile {
    path: PathBuf,
}

impl HeartbeatFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record a beat for `source`, overwriting any previous one.
    pub fn beat(&self, source: &str) -> Result<WorkerHeartbeat, StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let heartbeat = WorkerHeartbeat::now(source);
        let json = serde_json::to_string_pretty(&heartbeat)
            .map_err(|e| StoreError::encode(&self.path, e.to_string()))?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(heartbeat)
    }

    pub fn read(&self) -> Result<Option<WorkerHeartbeat>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::decode(&self.path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = HeartbeatFile::new(dir.path().join("state/heartbeat.json"));

        assert!(file.read().unwrap().is_none());

        let written = file.beat("projects").unwrap();
        let read = file.read().unwrap().unwrap();
        assert_eq!(read, written);
        assert_eq!(read.source, "projects");
        assert!(read.is_active());
    }

    #[test]
    fn test_beat_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let file = HeartbeatFile::new(dir.path().join("heartbeat.json"));

        file.beat("first").unwrap();
        file.beat("second").unwrap();
        assert_eq!(file.read().unwrap().unwrap().source, "second");
    }
}
