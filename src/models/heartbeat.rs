//! Worker heartbeat model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A heartbeat older than this is considered a dead worker.
pub const ACTIVE_THRESHOLD_SECS: i64 = 90;

/// Last sign of life from a queue worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub last_seen_at: DateTime<Utc>,
    /// Source the worker was processing when it last beat.
    pub source: String,
}

impl WorkerHeartbeat {
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            last_seen_at: Utc::now(),
            source: source.into(),
        }
    }

    /// Whether the worker beat recently enough to be considered alive.
    /// Liveness is derived from the timestamp, never stored.
    pub fn is_active(&self) -> bool {
        self.age_seconds() < ACTIVE_THRESHOLD_SECS
    }

    pub fn age_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.last_seen_at)
            .num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_heartbeat_is_active() {
        let hb = WorkerHeartbeat::now("projects");
        assert!(hb.is_active());
        assert_eq!(hb.source, "projects");
    }

    #[test]
    fn test_stale_heartbeat_is_inactive() {
        let hb = WorkerHeartbeat {
            last_seen_at: Utc::now() - Duration::seconds(ACTIVE_THRESHOLD_SECS + 1),
            source: "projects".to_string(),
        };
        assert!(!hb.is_active());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let hb = WorkerHeartbeat {
            last_seen_at: Utc::now() - Duration::seconds(ACTIVE_THRESHOLD_SECS),
            source: "projects".to_string(),
        };
        assert!(!hb.is_active());
    }
}
