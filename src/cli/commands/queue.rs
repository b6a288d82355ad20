//! Queue management commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use super::helpers::{self, truncate};
use crate::config::Settings;

/// Add URLs to a source's queue as pending entries.
pub async fn cmd_queue_add(
    settings: &Settings,
    source: &str,
    urls: &[String],
) -> anyhow::Result<()> {
    if urls.is_empty() {
        println!("{} No URLs given", style("!").yellow());
        return Ok(());
    }

    let store = helpers::queue_store(settings);
    let report = store.add_urls(source, urls)?;

    println!(
        "{} Added {} URLs to '{}' ({} duplicate, {} invalid)",
        style("✓").green(),
        report.added,
        source,
        report.duplicate,
        report.invalid
    );
    if report.added > 0 {
        println!(
            "  {} Run 'harvest enqueue {}' then 'harvest run {}' to process them",
            style("→").dim(),
            source,
            source
        );
    }

    Ok(())
}

/// Import URLs from a file: a queue-style CSV with the URL in the first
/// column, or a plain one-URL-per-line list.
pub async fn cmd_queue_import(
    settings: &Settings,
    source: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let delimiter = sniff_delimiter(raw.lines().next().unwrap_or(""));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(cell) = record.get(0) else { continue };
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case("url") {
            continue;
        }
        urls.push(cell.to_string());
    }

    if urls.is_empty() {
        println!(
            "{} No URLs found in {}",
            style("!").yellow(),
            file.display()
        );
        return Ok(());
    }

    let store = helpers::queue_store(settings);
    let report = store.add_urls(source, &urls)?;

    println!(
        "{} Imported {} of {} URLs from {} ({} duplicate, {} invalid)",
        style("✓").green(),
        report.added,
        urls.len(),
        file.display(),
        report.duplicate,
        report.invalid
    );

    Ok(())
}

fn sniff_delimiter(header: &str) -> u8 {
    if header.contains(';') {
        b';'
    } else if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// List queue entries with status and payload columns.
pub async fn cmd_queue_list(settings: &Settings, source: &str, limit: usize) -> anyhow::Result<()> {
    let store = helpers::queue_store(settings);
    let entries = store.load_entries(source)?;

    if entries.is_empty() {
        println!("{} Queue for '{}' is empty", style("!").yellow(), source);
        return Ok(());
    }

    let shown = if limit > 0 && limit < entries.len() {
        &entries[..limit]
    } else {
        &entries[..]
    };

    println!(
        "\n{:<56}  {:<10}  {:<8}  {:>6}  {:>5}  {:>6}  Detail",
        "URL", "Status", "Payload", "Chars", "Links", "Images"
    );
    println!("{}", "-".repeat(116));

    for entry in shown {
        let payload = entry
            .payload_status
            .map(|s| s.as_str())
            .unwrap_or("-");
        let chars = entry
            .payload_text_chars
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let links = entry
            .payload_links
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let images = entry
            .payload_images
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = if !entry.error.is_empty() {
            &entry.error
        } else {
            &entry.notes
        };

        println!(
            "{:<56}  {:<10}  {:<8}  {:>6}  {:>5}  {:>6}  {}",
            truncate(&entry.url, 56),
            entry.status.as_str(),
            payload,
            chars,
            links,
            images,
            truncate(detail, 40)
        );
    }

    if shown.len() < entries.len() {
        println!(
            "\nShowing {} of {} entries",
            shown.len(),
            entries.len()
        );
    } else {
        println!("\n{} entries", entries.len());
    }

    Ok(())
}

/// Re-queue eligible entries and optionally set the run budget.
pub async fn cmd_enqueue(
    settings: &Settings,
    source: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let store = helpers::queue_store(settings);
    let moved = store.requeue(source, limit)?;

    if let Some(n) = limit {
        store.update_state(source, |queue| {
            queue.remaining = Some(n as i64);
        })?;
    }

    if moved == 0 {
        println!(
            "{} No pending, errored, or skipped entries in '{}'",
            style("!").yellow(),
            source
        );
    } else {
        println!(
            "{} Enqueued {} entries for '{}'",
            style("✓").green(),
            moved,
            source
        );
        println!(
            "  {} Run 'harvest run {}' to process them",
            style("→").dim(),
            source
        );
    }

    Ok(())
}
