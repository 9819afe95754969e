//! Single-launch entry point
//!
//! Claims a frequency and broadcasts until Ctrl-C or a fatal error.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_radio_station::{
    config::{AppConfig, StorageConfig},
    orchestrator::LaunchOrchestrator,
    station::{Frequency, LaunchId, LaunchRequest, StatusRecord},
    status::StatusReporter,
};

#[derive(Parser, Debug)]
#[command(name = "launch_station", about = "Launch an AI radio station")]
struct Args {
    frequency: Frequency,
    station_name: String,
    topic: String,
    launch_id: LaunchId,

    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "STATION_CONFIG")]
    config: Option<PathBuf>,
}

/// Let a poller see why the launch never started
fn record_startup_failure(data_dir: &Path, launch_id: &LaunchId, error: &ai_radio_station::Error) {
    match StatusReporter::open(data_dir) {
        Ok(reporter) => {
            reporter.record_or_warn(launch_id, &StatusRecord::failed(format!("Failed: {error}")))
        }
        Err(e) => tracing::warn!(%launch_id, "Cannot record startup failure: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let storage = StorageConfig::from_lookup(|key| std::env::var(key).ok());
            record_startup_failure(&storage.data_dir, &args.launch_id, &e);
            return Err(e.into());
        }
    };

    let orchestrator = match LaunchOrchestrator::from_config(&config) {
        Ok(o) => o,
        Err(e) => {
            record_startup_failure(&config.storage.data_dir, &args.launch_id, &e);
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            ctrl_c.cancel();
        }
    });

    tracing::info!(
        "Launching {} on {} (launch {})",
        args.station_name,
        args.frequency,
        args.launch_id
    );

    let request = LaunchRequest {
        frequency: args.frequency,
        station_name: args.station_name,
        topic: args.topic,
        launch_id: args.launch_id,
    };
    let report = orchestrator.run(request, cancel).await;

    tracing::info!(
        "Launch ended {} after {} segment(s), {} bytes",
        report.state,
        report.segments_streamed,
        report.bytes_streamed
    );
    if report.failed() {
        anyhow::bail!(report.message);
    }
    Ok(())
}
