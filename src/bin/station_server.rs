//! Control API server
//!
//! Accepts launch requests over HTTP and runs each launch as a task.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_radio_station::{config::AppConfig, orchestrator::LaunchOrchestrator, ui::WebServer};

#[derive(Parser, Debug)]
#[command(name = "station_server", about = "HTTP control API for AI radio stations")]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "STATION_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
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

    tracing::info!("Starting station server");

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.ui.http_port = port;
    }

    let orchestrator = Arc::new(LaunchOrchestrator::from_config(&config)?);
    let server = WebServer::new(config.ui.clone(), orchestrator);
    let listener = server.bind().await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
            signal.cancel();
        }
    });

    server.serve(listener, shutdown).await?;
    Ok(())
}
