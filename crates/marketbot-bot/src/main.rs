//! Market buy bot - entry point.
//!
//! Thin host around `BuyService`: wires the HTTP collaborators, starts
//! the service, relays config-change notifications, and stops cleanly on
//! Ctrl+C.

use anyhow::Result;
use clap::Parser;
use marketbot_bot::{BuyService, ConfigStore};
use marketbot_market::{CommunityInventoryClient, MarketClient};
use std::sync::Arc;
use tracing::info;

/// Market buy bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MARKETBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    marketbot_telemetry::init_logging()?;

    info!("Starting marketbot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > MARKETBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("MARKETBOT_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    info!(config_path = %config_path, "Using configuration file");

    let store = Arc::new(ConfigStore::new(config_path));
    let changes = store
        .take_changes()
        .expect("change receiver taken before first use");

    let service = Arc::new(BuyService::new(
        store.clone(),
        Box::new(|config| {
            let client = MarketClient::new(config.api_url.clone(), config.key.clone())?;
            Ok(Arc::new(client) as Arc<dyn marketbot_market::PurchaseApi>)
        }),
        Box::new(|config| {
            let client = CommunityInventoryClient::new(config.inventory_url.clone())?;
            Ok(Arc::new(client) as Arc<dyn marketbot_market::InventorySource>)
        }),
    ));

    service.start().await?;

    // Hot reload: the host (or an external watcher calling
    // `store.notify_changed()`) feeds this loop; the service serializes
    // the stop-then-start cycles.
    let reload = tokio::spawn({
        let service = service.clone();
        async move { service.run_reload_loop(changes).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    service.stop().await?;
    reload.abort();

    Ok(())
}
