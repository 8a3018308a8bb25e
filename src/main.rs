//! Live map engine service
//!
//! Polls the configured snapshot endpoint, keeps the aggregation state
//! current, and logs a periodic summary until interrupted.

use anyhow::Context;
use livemap_engine::config::{load_dotenv, ConfigLoader, EngineConfig};
use livemap_engine::{LiveMapEngine, SnapshotClient};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env().context("loading engine configuration")?;
    config.validate().context("validating engine configuration")?;

    let mut engine = LiveMapEngine::new(config.clone());

    match &config.snapshot_url {
        Some(url) => {
            engine.start_polling(SnapshotClient::new(url.clone()));
        }
        None => {
            info!("LIVEMAP_SNAPSHOT_URL not set, polling disabled");
        }
    }

    info!("Live map engine started");

    let mut summary = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = summary.tick() => {
                let snapshot = engine.snapshot().await;
                info!(
                    regions = snapshot.regions.len(),
                    total_users = snapshot.total_users,
                    connected = snapshot.connected,
                    last_minute = engine.last_minute_count().await,
                    "Aggregation summary"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
