//! lumend - Lumen LED streaming server
//!
//! Loads every site file from a directory, starts one render loop per site
//! and streams frames to the configured controllers until interrupted.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lumen_config::load_locations;
use lumen_engine::LocationRegistry;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lumend")]
#[command(about = "Lumen LED streaming server")]
#[command(version)]
struct Cli {
    /// Directory of site `*.json` files
    #[arg(long, default_value = "locations")]
    locations: PathBuf,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds between status log lines, 0 to disable
    #[arg(long, default_value_t = 30)]
    status_interval: u64,

    /// Validate the site files and exit
    #[arg(long)]
    check: bool,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lumen={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn log_status(registry: &LocationRegistry) {
    for status in registry.status() {
        let active = status.active.as_ref().map(|a| a.name.as_str()).unwrap_or("-");
        let connected = status.controllers.iter().filter(|c| c.connected).count();
        info!(
            location = %status.name,
            active,
            queue = status.queue_length,
            ticks = status.counters.ticks_rendered,
            dropped = status.counters.ticks_dropped,
            spare_ms = status.spare_time_min_ms,
            controllers = status.controllers.len(),
            connected,
            "Status"
        );
    }
}

async fn run_until_shutdown(registry: &LocationRegistry, status_interval: u64) -> Result<()> {
    if status_interval == 0 {
        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(status_interval));
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                return Ok(());
            }
            _ = interval.tick() => log_status(registry),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!("Starting Lumen v{}", env!("CARGO_PKG_VERSION"));

    let configs = load_locations(&cli.locations)
        .with_context(|| format!("loading sites from {}", cli.locations.display()))?;
    if configs.is_empty() {
        warn!("No site files found in {}", cli.locations.display());
    }
    if cli.check {
        info!("{} site file(s) are valid", configs.len());
        return Ok(());
    }

    let registry = LocationRegistry::new(configs);
    registry.start_all().context("starting sites")?;

    let result = run_until_shutdown(&registry, cli.status_interval).await;
    info!("Shutting down");
    registry.stop_all();
    info!("Lumen stopped");
    result
}
