//! Queue state and worker liveness commands.

use console::style;

use super::helpers;
use crate::config::Settings;
use crate::models::WorkerHeartbeat;

/// Pause a source's queue. The worker observes the flag between items.
pub async fn cmd_pause(settings: &Settings, source: &str) -> anyhow::Result<()> {
    let store = helpers::queue_store(settings);
    store.update_state(source, |queue| {
        queue.paused = true;
    })?;

    println!(
        "{} Paused '{}'; the worker stops before its next claim",
        style("✓").green(),
        source
    );

    Ok(())
}

/// Clear a source's pause flag.
pub async fn cmd_resume(settings: &Settings, source: &str) -> anyhow::Result<()> {
    let store = helpers::queue_store(settings);
    let config = store.update_state(source, |queue| {
        queue.paused = false;
    })?;

    println!("{} Resumed '{}'", style("✓").green(), source);
    if config.queue.running {
        println!(
            "  {} A run was interrupted mid-queue; 'harvest run {}' picks it back up",
            style("→").dim(),
            source
        );
    }

    Ok(())
}

/// Show queue counts, state flags, and worker liveness.
pub async fn cmd_status(settings: &Settings, source: Option<&str>) -> anyhow::Result<()> {
    let store = helpers::queue_store(settings);
    let sources = match source {
        Some(name) => vec![name.to_string()],
        None => store.list_sources()?,
    };

    if sources.is_empty() {
        println!(
            "{} No sources found under {}",
            style("!").yellow(),
            settings.sources_dir().display()
        );
        println!(
            "  {} Run 'harvest init <source>' to create one",
            style("→").dim()
        );
        return Ok(());
    }

    for name in &sources {
        let config = store.load_config(name)?;
        let counts = store.status_counts(name)?;
        let total: usize = counts.iter().map(|(_, n)| n).sum();

        println!("\n{}", style(format!("Queue Status: {}", name)).bold());
        println!("{}", "-".repeat(40));

        let state_str = if config.queue.paused {
            style("Paused").yellow().to_string()
        } else if config.queue.running {
            style("Running").green().to_string()
        } else {
            style("Idle").dim().to_string()
        };
        println!("{:<20} {}", "State:", state_str);
        println!(
            "{:<20} {}",
            "Persist:",
            if config.queue.persist { "on" } else { "off" }
        );
        if let Some(remaining) = config.queue.remaining {
            println!("{:<20} {}", "Budget Remaining:", remaining);
        }

        println!("{:<20} {}", "Entries:", total);
        for (status, count) in counts {
            if count > 0 {
                println!("{:<20} {}", format!("  {}:", status.as_str()), count);
            }
        }
    }

    println!();
    let heartbeat = helpers::heartbeat_file(settings);
    match heartbeat.read()? {
        Some(hb) => print_heartbeat(&hb),
        None => println!("{:<20} {}", "Worker:", style("never seen").dim()),
    }

    Ok(())
}

fn print_heartbeat(hb: &WorkerHeartbeat) {
    let verdict = if hb.is_active() {
        style("active").green().to_string()
    } else {
        style("inactive").red().to_string()
    };
    println!(
        "{:<20} {} (last beat {}s ago, source '{}')",
        "Worker:",
        verdict,
        hb.age_seconds(),
        hb.source
    );
}
