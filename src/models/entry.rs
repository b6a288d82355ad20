//! Queue entry models for tracking per-URL harvest state.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a queued URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Queued,
    Processing,
    Done,
    Normalized,
    Error,
    Skipped,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Normalized => "normalized",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "normalized" => Some(Self::Normalized),
            "error" => Some(Self::Error),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Parse a status token from a queue file. Unknown or hand-edited
    /// values fall back to `Pending` rather than rejecting the row.
    pub fn parse_lossy(s: &str) -> Self {
        Self::from_str(s.trim()).unwrap_or(Self::Pending)
    }

    /// Statuses an operator may push back onto the queue.
    pub fn is_requeueable(&self) -> bool {
        matches!(self, Self::Pending | Self::Error | Self::Skipped)
    }

    /// Statuses a finished run leaves behind.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Normalized | Self::Error | Self::Skipped
        )
    }
}

/// Mechanical payload verdict for a harvested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStatus {
    Ok,
    Weak,
    TooThin,
}

impl PayloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Weak => "weak",
            Self::TooThin => "too_thin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "weak" => Some(Self::Weak),
            "too_thin" => Some(Self::TooThin),
            _ => None,
        }
    }
}

/// One row of a source's queue file.
///
/// Field order matches the on-disk CSV column order. Timestamps are kept as
/// RFC 3339 strings so a never-run entry round-trips as an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub url: String,
    pub status: EntryStatus,
    #[serde(default)]
    pub last_run_at: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_string_id: String,
    #[serde(default)]
    pub created_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_status: Option<PayloadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_text_chars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_links: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_images: Option<u32>,
}

impl QueueEntry {
    /// Create a fresh entry awaiting its first run.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: EntryStatus::Pending,
            last_run_at: String::new(),
            error: String::new(),
            notes: String::new(),
            created_string_id: String::new(),
            created_url: String::new(),
            payload_status: None,
            payload_text_chars: None,
            payload_links: None,
            payload_images: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_roundtrip() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Queued,
            EntryStatus::Processing,
            EntryStatus::Done,
            EntryStatus::Normalized,
            EntryStatus::Error,
            EntryStatus::Skipped,
        ] {
            let s = status.as_str();
            assert_eq!(EntryStatus::from_str(s), Some(status));
        }
    }

    #[test]
    fn test_entry_status_parse_lossy_unknown() {
        assert_eq!(EntryStatus::parse_lossy("unknown"), EntryStatus::Pending);
        assert_eq!(EntryStatus::parse_lossy(""), EntryStatus::Pending);
        assert_eq!(EntryStatus::parse_lossy(" done "), EntryStatus::Done);
    }

    #[test]
    fn test_entry_status_requeueable() {
        assert!(EntryStatus::Pending.is_requeueable());
        assert!(EntryStatus::Error.is_requeueable());
        assert!(EntryStatus::Skipped.is_requeueable());
        assert!(!EntryStatus::Done.is_requeueable());
        assert!(!EntryStatus::Normalized.is_requeueable());
        assert!(!EntryStatus::Processing.is_requeueable());
    }

    #[test]
    fn test_payload_status_roundtrip() {
        for status in [PayloadStatus::Ok, PayloadStatus::Weak, PayloadStatus::TooThin] {
            assert_eq!(PayloadStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PayloadStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_new_entry_defaults() {
        let entry = QueueEntry::new("https://example.com/project");
        assert_eq!(entry.status, EntryStatus::Pending);
        assert!(entry.last_run_at.is_empty());
        assert!(entry.error.is_empty());
        assert_eq!(entry.payload_status, None);
    }
}
