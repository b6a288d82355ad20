//! Advisory file locks for store mutations.
//!
//! A lock is a `create_new` file next to the data it protects; holding the
//! guard holds the lock. Workers on the same machine (or a shared volume)
//! coordinate through these without any daemon.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::warn;

use super::StoreError;

pub trait StoreLock: Send + Sync {
    fn acquire(&self, dir: &Path, name: &str) -> Result<LockGuard, StoreError>;
}

/// Held lock. Dropping it releases the lock file.
#[derive(Debug)]
pub struct LockGuard {
    path: Option<PathBuf>,
}

impl LockGuard {
    pub(crate) fn held(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub(crate) fn unheld() -> Self {
        Self { path: None }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Lock files on disk, with polling and stale-lock takeover.
#[derive(Debug, Clone)]
pub struct FileLock {
    /// Total time to wait for the lock before failing.
    pub timeout: Duration,
    /// Delay between acquisition attempts.
    pub poll: Duration,
    /// Age past which an existing lock is assumed orphaned by a dead
    /// process and removed.
    pub stale_after: Duration,
}

impl Default for FileLock {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll: Duration::from_millis(50),
            stale_after: Duration::from_secs(60),
        }
    }
}

impl StoreLock for FileLock {
    fn acquire(&self, dir: &Path, name: &str) -> Result<LockGuard, StoreError> {
        let path = dir.join(format!("{}.lock", name));
        let deadline = Instant::now() + self.timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(LockGuard::held(path));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path, self.stale_after) {
                        warn!("Removing stale lock file {}", path.display());
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout {
                            name: name.to_string(),
                            waited_ms: self.timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(self.poll);
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
    }
}

fn lock_is_stale(path: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > stale_after)
        .unwrap_or(false)
}

/// No coordination at all. For tests and single-shot tooling that owns its
/// data directory outright.
#[derive(Debug, Clone, Default)]
pub struct NoopLock;

impl StoreLock for NoopLock {
    fn acquire(&self, _dir: &Path, _name: &str) -> Result<LockGuard, StoreError> {
        Ok(LockGuard::unheld())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::default();

        let guard = lock.acquire(dir.path(), "urls").unwrap();
        assert!(dir.path().join("urls.lock").exists());

        drop(guard);
        assert!(!dir.path().join("urls.lock").exists());
    }

    #[test]
    fn test_contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock {
            timeout: Duration::from_millis(100),
            poll: Duration::from_millis(10),
            stale_after: Duration::from_secs(60),
        };

        let _held = lock.acquire(dir.path(), "urls").unwrap();
        let err = lock.acquire(dir.path(), "urls").unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout { .. }));
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("urls.lock"), "12345").unwrap();

        let lock = FileLock {
            timeout: Duration::from_millis(100),
            poll: Duration::from_millis(10),
            stale_after: Duration::ZERO,
        };
        let guard = lock.acquire(dir.path(), "urls").unwrap();
        drop(guard);
        assert!(!dir.path().join("urls.lock").exists());
    }

    #[test]
    fn test_noop_lock_never_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let lock = NoopLock;
        let _a = lock.acquire(dir.path(), "urls").unwrap();
        let _b = lock.acquire(dir.path(), "urls").unwrap();
        assert!(!dir.path().join("urls.lock").exists());
    }
}
