mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tracing::info;

use refurb_price_tracker_lib::application::PriceTracker;
use refurb_price_tracker_lib::infrastructure::{ConfigManager, init_logging_with_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let manager = cli
        .config
        .map_or_else(ConfigManager::with_default_path, ConfigManager::new);

    if matches!(cli.command, Commands::Init) {
        manager.initialize_on_first_run().await?;
        println!("Configuration written to {}", manager.config_path().display());
        return Ok(());
    }

    let mut config = manager.load_config()?;
    if let Commands::Run { parallel: true } = cli.command {
        config.crawl.parallel = true;
    }
    init_logging_with_config(&config.logging)?;
    info!("refurb-price-tracker {} starting", env!("CARGO_PKG_VERSION"));

    let tracker = PriceTracker::from_config(config)?;

    match cli.command {
        Commands::Run { .. } => {
            let mut state = tracker.start().await?;
            tracker.run_pass(&mut state).await?;
        }
        Commands::Watch { cycles } => {
            tokio::select! {
                result = tracker.watch(cycles) => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
            }
        }
        Commands::Replay { group, url, file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let outcome = tracker.replay(&group, &url, raw).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Stats => {
            let summaries = tracker.recompute_summaries().await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Init => {}
    }

    Ok(())
}
