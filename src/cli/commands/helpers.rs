//! Helper utilities for CLI commands.

use std::sync::Arc;

use crate::config::Settings;
use crate::fetch::PageFetcher;
use crate::oracle::OllamaOracle;
use crate::presentation::JsonPresentationStore;
use crate::runner::HarvestRunner;
use crate::safety::UrlSafetyChecker;
use crate::store::{FileLock, HeartbeatFile, QueueStore, ResultStore};

/// Truncate a string to a maximum length, adding "..." if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Queue store rooted at the settings' sources directory.
pub fn queue_store(settings: &Settings) -> QueueStore {
    QueueStore::new(settings.sources_dir(), Arc::new(FileLock::default()))
}

/// Result store rooted at the settings' sources directory.
pub fn result_store(settings: &Settings) -> ResultStore {
    ResultStore::new(settings.sources_dir(), Arc::new(FileLock::default()))
}

pub fn heartbeat_file(settings: &Settings) -> HeartbeatFile {
    HeartbeatFile::new(settings.heartbeat_path())
}

/// Assemble a full harvest runner for one source, wired to the JSON
/// presentation store and the configured oracle endpoint.
pub fn build_runner(settings: &Settings, source: &str) -> HarvestRunner {
    let checker = UrlSafetyChecker::new(settings.dns_policy);
    let fetcher = PageFetcher::new(checker, &settings.user_agent, settings.fetch_timeout_secs);
    let oracle = Arc::new(OllamaOracle::new(settings.oracle.clone()));
    let presentations = Arc::new(JsonPresentationStore::new(
        settings.presentations_path(),
        Arc::new(FileLock::default()),
    ));

    HarvestRunner::new(
        source,
        fetcher,
        oracle,
        presentations,
        queue_store(settings),
        result_store(settings),
        heartbeat_file(settings),
    )
}
