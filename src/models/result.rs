//! Harvest result model stored per URL under `results/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PayloadStatus;

/// Diagnostics captured during the fetch and extract stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchDebug {
    /// URL the fetch ended on after following redirects.
    #[serde(default)]
    pub final_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Leading slice of the raw response body, for eyeballing what the
    /// extractor was given.
    #[serde(default)]
    pub html_preview: String,
    #[serde(default)]
    pub link_count: u32,
    #[serde(default)]
    pub image_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_candidate: Option<String>,
    #[serde(default)]
    pub logo_candidate_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mechanical measurements of the extracted payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetrics {
    pub status: PayloadStatus,
    pub text_chars: u64,
    pub links: u32,
    pub images: u32,
    pub assets: u32,
}

/// The oracle's own verdict on whether the page content was usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleAssessment {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OracleAssessment {
    pub fn is_too_thin(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("too_thin")
    }
}

/// Pointer to a persisted presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRef {
    pub string_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Everything a harvest attempt learned about one URL.
///
/// Written even for failed and skipped attempts so an operator can inspect
/// what happened without re-fetching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestResult {
    /// Raw oracle reply text, before any JSON extraction.
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub debug: FetchDebug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PayloadMetrics>,
    /// The oracle's own verdict on the page content, when it gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_payload: Option<OracleAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<PresentationRef>,
    /// Set by the result store at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

impl HarvestResult {
    pub fn with_debug(debug: FetchDebug) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }
}
