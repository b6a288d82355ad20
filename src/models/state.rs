//! Per-source queue state and payload policy, persisted in `config.json`.

use serde::{Deserialize, Serialize};

/// Runtime switches for a source's queue loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    /// Operator-requested halt. Workers finish the in-flight URL and stop.
    #[serde(default)]
    pub paused: bool,
    /// Set while a worker loop owns the queue, cleared on every exit path.
    #[serde(default)]
    pub running: bool,
    /// Whether completed harvests are written through to the presentation
    /// store. Off means fetch/normalize only.
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Countdown for a bounded run. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

fn default_persist() -> bool {
    true
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            paused: false,
            running: false,
            persist: true,
            remaining: None,
        }
    }
}

/// Thresholds for the mechanical payload gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadPolicy {
    /// Text length at or above which a page stands on its own.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: u64,
    /// Text length at or above which a short page is still worth keeping.
    #[serde(default = "default_warn_text_chars")]
    pub warn_text_chars: u64,
    /// Link + image count that rescues a short page.
    #[serde(default = "default_min_assets")]
    pub min_assets: u32,
    /// When false, too-thin pages are recorded but not skipped.
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

fn default_min_text_chars() -> u64 {
    600
}

fn default_warn_text_chars() -> u64 {
    160
}

fn default_min_assets() -> u32 {
    2
}

fn default_enforce() -> bool {
    true
}

impl Default for PayloadPolicy {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            warn_text_chars: default_warn_text_chars(),
            min_assets: default_min_assets(),
            enforce: default_enforce(),
        }
    }
}

/// Which URL identifies a harvest for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// The source URL the oracle reports, falling back to the fetched URL
    /// when the oracle offers nothing usable.
    Oracle,
    /// The final URL after redirects, ignoring the oracle.
    Fetched,
}

impl DedupKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Fetched => "fetched",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "oracle" => Some(Self::Oracle),
            "fetched" => Some(Self::Fetched),
            _ => None,
        }
    }
}

impl Default for DedupKey {
    fn default() -> Self {
        Self::Oracle
    }
}

/// Full per-source configuration, stored as `sources/<name>/config.json`.
///
/// Missing sections take defaults, so a hand-written file only needs the
/// fields it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub queue: QueueState,
    #[serde(default)]
    pub payload: PayloadPolicy,
    #[serde(default)]
    pub dedup_key: DedupKey,
    /// Creator recorded on persisted presentations.
    #[serde(default = "default_creator_id")]
    pub creator_id: String,
}

fn default_creator_id() -> String {
    "harvester".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            queue: QueueState::default(),
            payload: PayloadPolicy::default(),
            dedup_key: DedupKey::default(),
            creator_id: default_creator_id(),
        }
    }
}
