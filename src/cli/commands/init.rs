//! Initialize command.

use console::style;

use crate::config::Settings;

use super::helpers;

/// Create the data directory layout and optionally scaffold a source.
pub async fn cmd_init(settings: &Settings, source: Option<&str>) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    if let Some(name) = source {
        let store = helpers::queue_store(settings);
        store.ensure_source(name)?;

        // Write the default config so operators have a file to edit.
        let config = store.load_config(name)?;
        store.save_config(name, &config)?;

        println!(
            "  {} Added source: {} (edit {} to tune payload thresholds)",
            style("✓").green(),
            name,
            store.source_dir(name).join("config.json").display()
        );
    }

    println!(
        "{} Initialized urlharvest in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    if source.is_none() {
        println!(
            "  {} Run 'harvest init <source>' to scaffold a source",
            style("→").dim()
        );
    }

    Ok(())
}
