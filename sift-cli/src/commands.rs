//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use sift_core::config::SiftConfig;
use sift_core::providers::{DuckDuckGoSearchProvider, HttpContentFetcher};
use sift_core::{IntentPlanner, OutputFormat, PipelineCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn handle_command(command: Commands, config: &SiftConfig) -> anyhow::Result<()> {
    match command {
        Commands::Plan { query } => {
            let plan = IntentPlanner::new()
                .with_reference_year(config.analysis.reference_year)
                .plan(&query);
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(config)?);
                Ok(())
            }
        },
    }
}

/// Run the full pipeline against the bundled HTTP collaborators.
pub async fn run_query(query: &str, format: OutputFormat, config: &SiftConfig) -> anyhow::Result<()> {
    let provider = DuckDuckGoSearchProvider::new(
        &config.http,
        Duration::from_secs(config.search.provider_timeout_secs),
    )?;
    let fetcher = HttpContentFetcher::new(
        &config.http,
        Duration::from_secs(config.analysis.fetch_timeout_secs),
        config.analysis.max_content_chars,
    )?;
    let coordinator = PipelineCoordinator::from_config(config, Arc::new(provider), Arc::new(fetcher));

    let (_, rendered) = coordinator
        .run_and_render(query, format, &CancellationToken::new())
        .await?;
    println!("{rendered}");
    Ok(())
}
