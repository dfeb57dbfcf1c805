//! Sift CLI: terminal front end for the agentic search pipeline.
//!
//! Runs a query end-to-end, prints a search plan, or shows the effective
//! configuration.

mod commands;

use clap::Parser;
use sift_core::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Sift: planned multi-source search with source-attributed answers
#[derive(Parser, Debug)]
#[command(name = "sift", version, about, long_about = None)]
struct Cli {
    /// Query to research
    query: Option<String>,

    /// Output format: markdown, summary, json
    #[arg(short, long, default_value = "markdown")]
    format: OutputFormat,

    /// Number of search hits to analyze in full
    #[arg(long)]
    top_n: Option<usize>,

    /// Global deadline for the whole pipeline, in seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Workspace directory (for `.sift/config.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the search plan for a query without searching
    Plan {
        /// Query to plan
        query: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective merged configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn,sift_core=info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "sift", "sift")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sift.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = sift_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    tracing::debug!(workspace = %workspace.display(), "Configuration loaded");

    if let Some(command) = cli.command {
        return commands::handle_command(command, &config);
    }

    // Apply CLI overrides
    if let Some(top_n) = cli.top_n {
        config.analysis.top_n = top_n;
    }
    if let Some(deadline) = cli.deadline {
        config.pipeline.deadline_secs = Some(deadline);
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    match cli.query {
        Some(query) if !query.trim().is_empty() => {
            commands::run_query(&query, cli.format, &config).await
        }
        _ => anyhow::bail!("No query given. Try `sift \"easy vegan lasagna recipe\"` or `sift --help`."),
    }
}
