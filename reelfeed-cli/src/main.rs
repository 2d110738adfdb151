//! Reelfeed CLI - Command-line interface
//!
//! Runs the feed services against a seeded in-memory store, with Gorse as
//! the recommender when an endpoint is configured.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reelfeed_core::tracing_setup::{CliLogLevel, init_tracing};
use reelfeed_core::{
    DisabledRecommender, FeedServices, MemoryVideoStore, RecommendationSource, ReelfeedConfig,
    SeedData,
};
use reelfeed_gorse::GorseProvider;

#[derive(Parser)]
#[command(name = "reelfeed")]
#[command(about = "Short-video feed composition and publishing")]
struct Cli {
    /// JSON file with authors and videos to load into the store
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// Directory for the full debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    /// Gorse base URL, overrides REELFEED_GORSE_ENDPOINT
    #[arg(long, global = true)]
    gorse_endpoint: Option<String>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let mut config = ReelfeedConfig::from_env();
    if let Some(endpoint) = cli.gorse_endpoint {
        config.recommender.endpoint = Some(endpoint);
    }

    let store = match &cli.seed {
        Some(path) => {
            let seed = SeedData::load(path)
                .with_context(|| format!("Failed to load seed data from {}", path.display()))?;
            MemoryVideoStore::with_seed(seed)
        }
        None => MemoryVideoStore::new(),
    };
    tracing::info!("Store loaded with {} videos", store.video_count());

    let services =
        FeedServices::with_snowflake_ids(&config, build_recommender(&config)?, Arc::new(store))?;

    let outcome = commands::handle_command(cli.command, &services).await;
    services.shutdown().await;

    let stats = services.propagation.stats();
    tracing::debug!(
        "Propagation: submitted={} completed={} failed={} timed_out={} dropped={}",
        stats.submitted,
        stats.completed,
        stats.failed,
        stats.timed_out,
        stats.dropped
    );

    outcome
}

fn build_recommender(config: &ReelfeedConfig) -> anyhow::Result<Arc<dyn RecommendationSource>> {
    match GorseProvider::from_config(&config.recommender)? {
        Some(provider) => {
            tracing::info!("Using Gorse recommender at {}", provider.base_url());
            Ok(Arc::new(provider))
        }
        None => {
            tracing::info!("No recommender configured, feeds use the chronological store feed");
            Ok(Arc::new(DisabledRecommender))
        }
    }
}
