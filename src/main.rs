//! OpenSea Flyer CLI
//!
//! Posts OpenSea collection activity to a Discord channel.

use anyhow::{Context, Result};
use clap::Parser;
use opensea_flyer::{Config, DiscordChannel, Flyer, OpenSeaClient};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "opensea-flyer")]
#[command(about = "Posts OpenSea sales, auctions, bids, offers and transfers to Discord")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;

    info!(
        "Watching collection {} (contract filter: {})",
        config.collection_slug,
        config.contract_filter().unwrap_or("none")
    );

    let source = OpenSeaClient::new(&config).context("Failed to create OpenSea client")?;
    let sink = DiscordChannel::connect(&config)
        .await
        .context("Failed to connect to Discord")?;

    let mut flyer = Flyer::new(source, sink, &config);

    if cli.once {
        let report = flyer.run_cycle().await;
        info!("Single cycle complete: {}", report);
        return Ok(());
    }

    flyer.run().await;
    Ok(())
}
