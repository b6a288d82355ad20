//! urlharvest - URL harvesting and normalization pipeline.
//!
//! Fetches operator-queued URLs, extracts their content, normalizes it
//! through a local model, and persists the results as project presentations.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use urlharvest::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "urlharvest=info"
    } else {
        "urlharvest=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
