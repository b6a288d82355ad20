//! Harvest pipeline and queue worker.
//!
//! One URL flows fetch -> extract -> assess -> normalize -> persist. Every
//! attempt produces a stored result and exactly one outcome; a bad URL
//! never takes the worker loop down with it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::extract;
use crate::fetch::{FetchError, PageFetcher};
use crate::models::{
    DedupKey, EntryStatus, FetchDebug, HarvestResult, PayloadStatus, PresentationRef, QueueEntry,
    SourceConfig,
};
use crate::oracle::{NormalizeRequest, NormalizedProject, Oracle};
use crate::payload;
use crate::presentation::PresentationStore;
use crate::store::{HeartbeatFile, QueueStore, ResultStore};

/// Failure classes recorded in the queue's error column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UnsafeUrl,
    TransportError,
    RedirectError,
    HttpError,
    TooThin,
    OracleError,
    Duplicate,
    PersistError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsafeUrl => "unsafe_url",
            Self::TransportError => "transport_error",
            Self::RedirectError => "redirect_error",
            Self::HttpError => "http_error",
            Self::TooThin => "too_thin",
            Self::OracleError => "oracle_error",
            Self::Duplicate => "duplicate",
            Self::PersistError => "persist_error",
        }
    }
}

fn failure_kind_for_fetch(error: &FetchError) -> FailureKind {
    match error {
        FetchError::Unsafe(_) => FailureKind::UnsafeUrl,
        FetchError::TooManyRedirects(_) | FetchError::BadLocation(_) => FailureKind::RedirectError,
        FetchError::Status(_) => FailureKind::HttpError,
        FetchError::Transport(_) => FailureKind::TransportError,
    }
}

/// How one harvest attempt ended. Every variant carries the full result,
/// which is stored whether or not the attempt succeeded.
#[derive(Debug)]
pub enum HarvestOutcome {
    /// Fetched and normalized; persisted too when persistence is on.
    Completed {
        result: HarvestResult,
        presentation: Option<PresentationRef>,
    },
    /// Deliberately not persisted. The reason lands in the queue notes.
    Skipped {
        reason: String,
        result: HarvestResult,
    },
    /// A presentation for the same canonical URL already exists.
    Duplicate {
        existing: PresentationRef,
        result: HarvestResult,
    },
    Failed {
        kind: FailureKind,
        message: String,
        result: HarvestResult,
    },
}

impl HarvestOutcome {
    pub fn result(&self) -> &HarvestResult {
        match self {
            Self::Completed { result, .. }
            | Self::Skipped { result, .. }
            | Self::Duplicate { result, .. }
            | Self::Failed { result, .. } => result,
        }
    }

    pub fn result_mut(&mut self) -> &mut HarvestResult {
        match self {
            Self::Completed { result, .. }
            | Self::Skipped { result, .. }
            | Self::Duplicate { result, .. }
            | Self::Failed { result, .. } => result,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::Duplicate { .. } => "duplicate",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Progress events emitted by the queue worker.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Claimed {
        url: String,
    },
    Finished {
        url: String,
        status: EntryStatus,
        detail: String,
    },
}

/// Why the queue loop stopped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No queued entries left.
    #[default]
    Drained,
    /// Operator pause observed between items.
    Paused,
    /// The `remaining` countdown reached zero.
    BudgetSpent,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Drained => "queue drained",
            Self::Paused => "queue paused",
            Self::BudgetSpent => "run budget spent",
        }
    }
}

/// Tally of a queue run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub done: usize,
    pub normalized: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub stopped: StopReason,
}

impl RunSummary {
    fn record(&mut self, outcome: &HarvestOutcome) {
        self.processed += 1;
        match outcome {
            HarvestOutcome::Completed {
                presentation: Some(_),
                ..
            } => self.normalized += 1,
            HarvestOutcome::Completed {
                presentation: None, ..
            } => self.done += 1,
            HarvestOutcome::Skipped { .. } => self.skipped += 1,
            HarvestOutcome::Duplicate { .. } => self.duplicates += 1,
            HarvestOutcome::Failed { .. } => self.errors += 1,
        }
    }
}

/// The URL that identifies a harvest for duplicate detection.
fn canonical_source_url(
    dedup_key: DedupKey,
    fields: Option<&NormalizedProject>,
    final_url: &Url,
) -> String {
    if dedup_key == DedupKey::Oracle {
        if let Some(candidate) = fields.and_then(|f| f.source_url.as_deref()) {
            if let Ok(parsed) = Url::parse(candidate.trim()) {
                if matches!(parsed.scheme(), "http" | "https") {
                    return parsed.to_string();
                }
            }
        }
    }
    final_url.to_string()
}

/// Fold an outcome back into the queue entry it came from.
pub fn apply_outcome(entry: &QueueEntry, outcome: &HarvestOutcome) -> QueueEntry {
    let mut updated = entry.clone();

    if let Some(metrics) = outcome.result().payload {
        updated.payload_status = Some(metrics.status);
        updated.payload_text_chars = Some(metrics.text_chars);
        updated.payload_links = Some(metrics.links);
        updated.payload_images = Some(metrics.images);
    }

    match outcome {
        HarvestOutcome::Completed { presentation, .. } => {
            updated.status = if presentation.is_some() {
                EntryStatus::Normalized
            } else {
                EntryStatus::Done
            };
            updated.error.clear();
            updated.notes.clear();
            if let Some(handle) = presentation {
                updated.created_string_id = handle.string_id.clone();
                updated.created_url = handle.url.clone().unwrap_or_default();
            }
        }
        HarvestOutcome::Skipped { reason, .. } => {
            updated.status = EntryStatus::Skipped;
            updated.error.clear();
            updated.notes = reason.clone();
        }
        HarvestOutcome::Duplicate { existing, .. } => {
            updated.status = EntryStatus::Done;
            updated.error.clear();
            updated.notes = format!("duplicate of {}", existing.string_id);
            updated.created_string_id = existing.string_id.clone();
            updated.created_url = existing.url.clone().unwrap_or_default();
        }
        HarvestOutcome::Failed { kind, message, .. } => {
            updated.status = EntryStatus::Error;
            updated.error = format!("{}: {}", kind.as_str(), message);
            updated.notes.clear();
        }
    }

    updated
}

/// Drives URLs through the harvest pipeline for one source.
pub struct HarvestRunner {
    source: String,
    fetcher: PageFetcher,
    oracle: Arc<dyn Oracle>,
    presentations: Arc<dyn PresentationStore>,
    queue: QueueStore,
    results: ResultStore,
    heartbeat: HeartbeatFile,
    /// Process-lifetime persist override. The stored config is untouched.
    persist_override: Option<bool>,
}

impl HarvestRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: impl Into<String>,
        fetcher: PageFetcher,
        oracle: Arc<dyn Oracle>,
        presentations: Arc<dyn PresentationStore>,
        queue: QueueStore,
        results: ResultStore,
        heartbeat: HeartbeatFile,
    ) -> Self {
        Self {
            source: source.into(),
            fetcher,
            oracle,
            presentations,
            queue,
            results,
            heartbeat,
            persist_override: None,
        }
    }

    /// Force persistence on or off for this runner's lifetime, leaving the
    /// stored config untouched.
    pub fn with_persist_override(mut self, persist: bool) -> Self {
        self.persist_override = Some(persist);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    fn effective_config(&self, mut config: SourceConfig) -> SourceConfig {
        if let Some(persist) = self.persist_override {
            config.queue.persist = persist;
        }
        config
    }

    /// Harvest one URL and store its result. Never propagates per-URL
    /// failures; they come back classified inside the outcome. The result
    /// is keyed by the requested URL, not wherever redirects ended up.
    pub async fn harvest(&self, url: &str, config: &SourceConfig) -> HarvestOutcome {
        let config = self.effective_config(config.clone());
        let mut outcome = self.run_pipeline(url, &config).await;
        if let Err(e) = self
            .results
            .store(&self.source, url, outcome.result_mut())
        {
            warn!("Could not store result for {}: {}", url, e);
        }
        outcome
    }

    async fn run_pipeline(&self, url: &str, config: &SourceConfig) -> HarvestOutcome {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                return HarvestOutcome::Failed {
                    kind: failure_kind_for_fetch(&e),
                    message: e.to_string(),
                    result: HarvestResult::with_debug(FetchDebug {
                        final_url: url.to_string(),
                        error: Some(e.to_string()),
                        ..FetchDebug::default()
                    }),
                };
            }
        };

        let content = extract::extract(&page.html, &page.url);
        let metrics = payload::assess(
            content.text_chars(),
            content.links.len() as u32,
            content.images.len() as u32,
            &config.payload,
        );

        let mut result = HarvestResult::with_debug(FetchDebug {
            final_url: page.url.to_string(),
            http_status: Some(page.status),
            html_preview: extract::html_preview(&page.html),
            link_count: content.links.len() as u32,
            image_count: content.images.len() as u32,
            logo_candidate: content.logo_candidate.clone(),
            logo_candidate_count: content.logo_candidate_count as u32,
            error: None,
        });
        result.payload = Some(metrics);

        if config.payload.enforce && metrics.status == PayloadStatus::TooThin {
            return HarvestOutcome::Skipped {
                reason: format!(
                    "too_thin: {} text chars, {} assets",
                    metrics.text_chars, metrics.assets
                ),
                result,
            };
        }

        let request = NormalizeRequest {
            url: page.url.to_string(),
            text: content.text,
            links: content.links,
            images: content.images,
        };
        let reply = match self.oracle.normalize(&request).await {
            Ok(reply) => reply,
            Err(e) if config.queue.persist => {
                return HarvestOutcome::Failed {
                    kind: FailureKind::OracleError,
                    message: e.to_string(),
                    result,
                };
            }
            Err(e) => {
                // Inspection-only run: nothing downstream needs the reply,
                // so record what happened and keep the fetch data.
                warn!("Oracle call for {} failed: {}", url, e);
                result.debug.error = Some(e.to_string());
                return HarvestOutcome::Completed {
                    result,
                    presentation: None,
                };
            }
        };

        result.raw = reply.raw.clone();
        result.ai_payload = reply.assessment.clone();

        // The oracle saw the actual content, so its thin verdict overrules
        // the mechanical one.
        if let Some(assessment) = &reply.assessment {
            if assessment.is_too_thin() {
                let reason = match &assessment.reason {
                    Some(r) => format!("too_thin: {}", r),
                    None => "too_thin: oracle assessment".to_string(),
                };
                return HarvestOutcome::Skipped { reason, result };
            }
        }

        if !config.queue.persist {
            return HarvestOutcome::Completed {
                result,
                presentation: None,
            };
        }

        let Some(fields) = reply.fields else {
            return HarvestOutcome::Failed {
                kind: FailureKind::OracleError,
                message: "oracle reply contained no parseable JSON".to_string(),
                result,
            };
        };

        let canonical = canonical_source_url(config.dedup_key, Some(&fields), &page.url);

        match self.presentations.find_by_source_url(&canonical).await {
            Ok(Some(existing)) => {
                result.presentation = Some(existing.clone());
                return HarvestOutcome::Duplicate { existing, result };
            }
            Ok(None) => {}
            Err(e) => {
                return HarvestOutcome::Failed {
                    kind: FailureKind::PersistError,
                    message: format!("duplicate lookup failed: {}", e),
                    result,
                };
            }
        }

        match self
            .presentations
            .persist(&fields, &canonical, &config.creator_id)
            .await
        {
            Ok(handle) => {
                info!(
                    "Persisted presentation {} for {}",
                    handle.string_id, canonical
                );
                result.presentation = Some(handle.clone());
                HarvestOutcome::Completed {
                    result,
                    presentation: Some(handle),
                }
            }
            Err(e) => HarvestOutcome::Failed {
                kind: FailureKind::PersistError,
                message: e.to_string(),
                result,
            },
        }
    }

    /// Process queued entries until the queue empties, a pause is
    /// requested, or the run budget is spent. A pause leaves the running
    /// flag set so a later resume visibly has work waiting; any other exit
    /// clears it.
    pub async fn run_queue(
        &self,
        limit: Option<usize>,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> anyhow::Result<RunSummary> {
        self.queue.update_state(&self.source, |queue| {
            queue.running = true;
            // An explicit limit replaces any countdown already in the
            // state; otherwise the stored one is honored.
            if limit.is_some() {
                queue.remaining = limit.map(|n| n as i64);
            }
        })?;

        let outcome = self.run_queue_inner(&events).await;

        let paused = matches!(
            &outcome,
            Ok(summary) if summary.stopped == StopReason::Paused
        );
        if !paused {
            if let Err(e) = self.queue.update_state(&self.source, |queue| {
                queue.running = false;
            }) {
                warn!("Could not clear running flag for {}: {}", self.source, e);
            }
        }

        outcome
    }

    async fn run_queue_inner(
        &self,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        loop {
            // Reload each iteration so pause and budget edits made while
            // the run is underway take effect at the next claim.
            let config = self.effective_config(self.queue.load_config(&self.source)?);
            if config.queue.paused {
                info!("Queue for {} is paused, stopping", self.source);
                summary.stopped = StopReason::Paused;
                break;
            }
            if config.queue.remaining.is_some_and(|n| n <= 0) {
                info!("Run budget for {} spent, stopping", self.source);
                summary.stopped = StopReason::BudgetSpent;
                break;
            }

            if let Err(e) = self.heartbeat.beat(&self.source) {
                warn!("Could not write heartbeat: {}", e);
            }

            let Some(entry) = self.queue.claim_next(&self.source)? else {
                info!("Queue for {} is empty", self.source);
                summary.stopped = StopReason::Drained;
                break;
            };
            let _ = events.send(RunEvent::Claimed {
                url: entry.url.clone(),
            });

            let outcome = self.harvest(&entry.url, &config).await;
            summary.record(&outcome);

            let updated = apply_outcome(&entry, &outcome);
            self.queue.update_entry(&self.source, &updated)?;

            let detail = match &outcome {
                HarvestOutcome::Completed { .. } => outcome.label().to_string(),
                HarvestOutcome::Skipped { reason, .. } => reason.clone(),
                HarvestOutcome::Duplicate { existing, .. } => {
                    format!("duplicate of {}", existing.string_id)
                }
                HarvestOutcome::Failed { kind, message, .. } => {
                    format!("{}: {}", kind.as_str(), message)
                }
            };
            let _ = events.send(RunEvent::Finished {
                url: entry.url.clone(),
                status: updated.status,
                detail,
            });

            if config.queue.remaining.is_some() {
                self.queue.update_state(&self.source, |queue| {
                    if let Some(n) = queue.remaining.as_mut() {
                        *n -= 1;
                    }
                })?;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PayloadMetrics, PayloadStatus};

    fn entry() -> QueueEntry {
        let mut entry = QueueEntry::new("https://example.com/p");
        entry.status = EntryStatus::Processing;
        entry
    }

    fn result_with_metrics() -> HarvestResult {
        let mut result = HarvestResult::default();
        result.payload = Some(PayloadMetrics {
            status: PayloadStatus::Ok,
            text_chars: 900,
            links: 3,
            images: 2,
            assets: 5,
        });
        result
    }

    #[test]
    fn test_apply_outcome_normalized() {
        let outcome = HarvestOutcome::Completed {
            result: result_with_metrics(),
            presentation: Some(PresentationRef {
                string_id: "abc123".to_string(),
                url: Some("https://hub.example.com/abc123".to_string()),
            }),
        };
        let updated = apply_outcome(&entry(), &outcome);
        assert_eq!(updated.status, EntryStatus::Normalized);
        assert_eq!(updated.created_string_id, "abc123");
        assert_eq!(updated.created_url, "https://hub.example.com/abc123");
        assert_eq!(updated.payload_status, Some(PayloadStatus::Ok));
        assert_eq!(updated.payload_text_chars, Some(900));
        assert!(updated.error.is_empty());
        assert!(updated.notes.is_empty());
    }

    #[test]
    fn test_apply_outcome_done_without_persistence() {
        let outcome = HarvestOutcome::Completed {
            result: result_with_metrics(),
            presentation: None,
        };
        let updated = apply_outcome(&entry(), &outcome);
        assert_eq!(updated.status, EntryStatus::Done);
        assert!(updated.created_string_id.is_empty());
    }

    #[test]
    fn test_apply_outcome_skipped_sets_notes() {
        let mut start = entry();
        start.error = "http_error: old".to_string();
        let outcome = HarvestOutcome::Skipped {
            reason: "too_thin: 42 text chars, 1 assets".to_string(),
            result: HarvestResult::default(),
        };
        let updated = apply_outcome(&start, &outcome);
        assert_eq!(updated.status, EntryStatus::Skipped);
        assert_eq!(updated.notes, "too_thin: 42 text chars, 1 assets");
        assert!(updated.error.is_empty());
    }

    #[test]
    fn test_apply_outcome_duplicate_links_existing() {
        let outcome = HarvestOutcome::Duplicate {
            existing: PresentationRef {
                string_id: "earlier".to_string(),
                url: None,
            },
            result: result_with_metrics(),
        };
        let updated = apply_outcome(&entry(), &outcome);
        assert_eq!(updated.status, EntryStatus::Done);
        assert_eq!(updated.notes, "duplicate of earlier");
        assert_eq!(updated.created_string_id, "earlier");
        assert!(updated.created_url.is_empty());
    }

    #[test]
    fn test_apply_outcome_failed_writes_error_token() {
        let outcome = HarvestOutcome::Failed {
            kind: FailureKind::TransportError,
            message: "connection refused".to_string(),
            result: HarvestResult::default(),
        };
        let updated = apply_outcome(&entry(), &outcome);
        assert_eq!(updated.status, EntryStatus::Error);
        assert_eq!(updated.error, "transport_error: connection refused");
    }

    #[test]
    fn test_failure_kind_tokens() {
        assert_eq!(FailureKind::UnsafeUrl.as_str(), "unsafe_url");
        assert_eq!(FailureKind::TransportError.as_str(), "transport_error");
        assert_eq!(FailureKind::RedirectError.as_str(), "redirect_error");
        assert_eq!(FailureKind::HttpError.as_str(), "http_error");
        assert_eq!(FailureKind::TooThin.as_str(), "too_thin");
        assert_eq!(FailureKind::OracleError.as_str(), "oracle_error");
        assert_eq!(FailureKind::Duplicate.as_str(), "duplicate");
        assert_eq!(FailureKind::PersistError.as_str(), "persist_error");
    }

    #[test]
    fn test_fetch_error_classification() {
        use crate::safety::SafetyViolation;
        assert_eq!(
            failure_kind_for_fetch(&FetchError::Unsafe(SafetyViolation::Credentials)),
            FailureKind::UnsafeUrl
        );
        assert_eq!(
            failure_kind_for_fetch(&FetchError::TooManyRedirects(3)),
            FailureKind::RedirectError
        );
        assert_eq!(
            failure_kind_for_fetch(&FetchError::BadLocation("x".to_string())),
            FailureKind::RedirectError
        );
        assert_eq!(
            failure_kind_for_fetch(&FetchError::Status(reqwest::StatusCode::NOT_FOUND)),
            FailureKind::HttpError
        );
        assert_eq!(
            failure_kind_for_fetch(&FetchError::Transport("timed out".to_string())),
            FailureKind::TransportError
        );
    }

    #[test]
    fn test_canonical_url_prefers_oracle_source() {
        let final_url = Url::parse("https://mirror.example.net/cached/p").unwrap();
        let fields = NormalizedProject {
            source_url: Some("https://example.com/original".to_string()),
            ..NormalizedProject::default()
        };

        assert_eq!(
            canonical_source_url(DedupKey::Oracle, Some(&fields), &final_url),
            "https://example.com/original"
        );
        assert_eq!(
            canonical_source_url(DedupKey::Fetched, Some(&fields), &final_url),
            "https://mirror.example.net/cached/p"
        );
    }

    #[test]
    fn test_canonical_url_rejects_unusable_oracle_values() {
        let final_url = Url::parse("https://example.com/p").unwrap();
        for bad in ["", "not a url", "ftp://example.com/x", "javascript:alert(1)"] {
            let fields = NormalizedProject {
                source_url: Some(bad.to_string()),
                ..NormalizedProject::default()
            };
            assert_eq!(
                canonical_source_url(DedupKey::Oracle, Some(&fields), &final_url),
                "https://example.com/p",
                "oracle value {:?} should fall back",
                bad
            );
        }
        assert_eq!(
            canonical_source_url(DedupKey::Oracle, None, &final_url),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_run_summary_tallies() {
        let mut summary = RunSummary::default();
        summary.record(&HarvestOutcome::Completed {
            result: HarvestResult::default(),
            presentation: Some(PresentationRef {
                string_id: "x".to_string(),
                url: None,
            }),
        });
        summary.record(&HarvestOutcome::Completed {
            result: HarvestResult::default(),
            presentation: None,
        });
        summary.record(&HarvestOutcome::Skipped {
            reason: "too_thin".to_string(),
            result: HarvestResult::default(),
        });
        summary.record(&HarvestOutcome::Failed {
            kind: FailureKind::HttpError,
            message: "404".to_string(),
            result: HarvestResult::default(),
        });

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.normalized, 1);
        assert_eq!(summary.done, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.stopped, StopReason::Drained);
    }

    #[test]
    fn test_stop_reason_descriptions() {
        assert_eq!(StopReason::Drained.describe(), "queue drained");
        assert_eq!(StopReason::Paused.describe(), "queue paused");
        assert_eq!(StopReason::BudgetSpent.describe(), "run budget spent");
    }
}
