//! Queue worker and single-URL harvest commands.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use super::helpers::{self, truncate};
use crate::config::Settings;
use crate::models::{EntryStatus, QueueEntry};
use crate::runner::{apply_outcome, HarvestOutcome, RunEvent};

/// Drive the queue for one source until it drains, pauses, or the run
/// budget is spent.
pub async fn cmd_run(
    settings: &Settings,
    source: &str,
    limit: Option<usize>,
    no_persist: bool,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let store = helpers::queue_store(settings);
    let queued = store
        .load_entries(source)?
        .iter()
        .filter(|e| e.status == EntryStatus::Queued)
        .count();

    if queued == 0 {
        println!("{} No queued entries in '{}'", style("!").yellow(), source);
        println!(
            "  {} Run 'harvest enqueue {}' to queue pending entries",
            style("→").dim(),
            source
        );
        return Ok(());
    }

    let mut runner = helpers::build_runner(settings, source);
    if no_persist {
        runner = runner.with_persist_override(false);
    }
    let runner = Arc::new(runner);

    let total = limit.map(|n| n.min(queued)).unwrap_or(queued);
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_queue(limit, event_tx).await })
    };

    while let Some(event) = event_rx.recv().await {
        match event {
            RunEvent::Claimed { url } => {
                pb.set_message(truncate(&url, 60));
            }
            RunEvent::Finished {
                url,
                status,
                detail,
            } => {
                let marker = match status {
                    EntryStatus::Normalized | EntryStatus::Done => style("✓").green(),
                    EntryStatus::Skipped => style("-").yellow(),
                    _ => style("✗").red(),
                };
                pb.println(format!("{} {} ({})", marker, truncate(&url, 70), detail));
                pb.inc(1);
            }
        }
    }

    let summary = worker.await??;
    pb.finish_and_clear();

    println!(
        "{} Processed {} URLs from '{}' ({})",
        style("✓").green(),
        summary.processed,
        source,
        summary.stopped.describe()
    );
    println!(
        "  {} normalized, {} done, {} duplicate, {} skipped, {} errors",
        summary.normalized, summary.done, summary.duplicates, summary.skipped, summary.errors
    );

    Ok(())
}

/// Harvest a single URL right now, recording the attempt in the queue the
/// same way a queue run would.
pub async fn cmd_harvest(
    settings: &Settings,
    source: &str,
    url: &str,
    no_persist: bool,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let mut runner = helpers::build_runner(settings, source);
    if no_persist {
        runner = runner.with_persist_override(false);
    }

    let store = runner.queue();
    store.ensure_source(source)?;
    let config = store.load_config(source)?;

    let mut entry = store
        .load_entries(source)?
        .into_iter()
        .find(|e| e.url == url)
        .unwrap_or_else(|| QueueEntry::new(url));
    entry.status = EntryStatus::Processing;
    entry.last_run_at = chrono::Utc::now().to_rfc3339();
    entry.error.clear();
    store.update_entry(source, &entry)?;

    let outcome = runner.harvest(url, &config).await;
    let updated = apply_outcome(&entry, &outcome);
    store.update_entry(source, &updated)?;

    match &outcome {
        HarvestOutcome::Completed { presentation, .. } => match presentation {
            Some(handle) => println!(
                "{} Normalized and persisted as {}",
                style("✓").green(),
                handle.string_id
            ),
            None => println!(
                "{} Harvested without persisting a presentation",
                style("✓").green()
            ),
        },
        HarvestOutcome::Skipped { reason, .. } => {
            println!("{} Skipped: {}", style("-").yellow(), reason);
        }
        HarvestOutcome::Duplicate { existing, .. } => {
            println!(
                "{} Already imported as {}",
                style("!").yellow(),
                existing.string_id
            );
        }
        HarvestOutcome::Failed { kind, message, .. } => {
            println!(
                "{} Failed ({}): {}",
                style("✗").red(),
                kind.as_str(),
                message
            );
        }
    }

    if let Some(metrics) = &outcome.result().payload {
        println!(
            "  payload: {} ({} chars, {} links, {} images)",
            metrics.status.as_str(),
            metrics.text_chars,
            metrics.links,
            metrics.images
        );
    }
    println!(
        "  {} 'harvest result {} <url>' shows the stored record",
        style("→").dim(),
        source
    );

    Ok(())
}
