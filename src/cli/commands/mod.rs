//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod helpers;
mod init;
mod queue;
mod result_cmd;
mod run_cmd;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "URL harvesting and normalization pipeline")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory layout
    Init {
        /// Source to scaffold with a default config
        source: Option<String>,
    },

    /// Manage a source's URL queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },

    /// Move pending, errored, and skipped entries back onto the queue
    Enqueue {
        /// Source name
        source: String,
        /// Enqueue at most this many entries and set the run budget to match
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Process queued URLs until the queue drains, pauses, or the budget runs out
    Run {
        /// Source name
        source: String,
        /// Process at most this many URLs
        #[arg(short, long)]
        limit: Option<usize>,
        /// Fetch and normalize but do not write presentations
        #[arg(long)]
        no_persist: bool,
    },

    /// Harvest a single URL immediately, bypassing queue order
    Harvest {
        /// Source name
        source: String,
        /// URL to harvest
        url: String,
        /// Fetch and normalize but do not write a presentation
        #[arg(long)]
        no_persist: bool,
    },

    /// Pause a source's queue (takes effect between items)
    Pause {
        /// Source name
        source: String,
    },

    /// Resume a paused queue
    Resume {
        /// Source name
        source: String,
    },

    /// Show queue counts, state flags, and worker liveness
    Status {
        /// Source name (all sources if not specified)
        source: Option<String>,
    },

    /// Print the stored harvest result for a URL
    Result {
        /// Source name
        source: String,
        /// URL or 40-character result key
        url_or_key: String,
    },

    /// Run the URL safety checker against a URL and print the verdict
    Check {
        /// URL to check
        url: String,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Add URLs to the queue as pending entries
    Add {
        /// Source name
        source: String,
        /// URLs to add
        urls: Vec<String>,
    },

    /// Import URLs from a file (CSV first column, or one per line)
    Import {
        /// Source name
        source: String,
        /// File containing URLs
        file: PathBuf,
    },

    /// List queue entries
    List {
        /// Source name
        source: String,
        /// Limit number of rows shown (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data,
    };
    let settings = load_settings(&options)?;

    match cli.command {
        Commands::Init { source } => init::cmd_init(&settings, source.as_deref()).await,
        Commands::Queue { command } => match command {
            QueueCommands::Add { source, urls } => {
                queue::cmd_queue_add(&settings, &source, &urls).await
            }
            QueueCommands::Import { source, file } => {
                queue::cmd_queue_import(&settings, &source, &file).await
            }
            QueueCommands::List { source, limit } => {
                queue::cmd_queue_list(&settings, &source, limit).await
            }
        },
        Commands::Enqueue { source, limit } => queue::cmd_enqueue(&settings, &source, limit).await,
        Commands::Run {
            source,
            limit,
            no_persist,
        } => run_cmd::cmd_run(&settings, &source, limit, no_persist).await,
        Commands::Harvest {
            source,
            url,
            no_persist,
        } => run_cmd::cmd_harvest(&settings, &source, &url, no_persist).await,
        Commands::Pause { source } => state::cmd_pause(&settings, &source).await,
        Commands::Resume { source } => state::cmd_resume(&settings, &source).await,
        Commands::Status { source } => state::cmd_status(&settings, source.as_deref()).await,
        Commands::Result { source, url_or_key } => {
            result_cmd::cmd_result(&settings, &source, &url_or_key).await
        }
        Commands::Check { url } => result_cmd::cmd_check(&settings, &url).await,
    }
}
