//! Control API server

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use super::handlers;
use crate::config::UiConfig;
use crate::orchestrator::LaunchOrchestrator;
use crate::station::LaunchId;

/// Shared state for handlers
pub struct AppState {
    pub orchestrator: Arc<LaunchOrchestrator>,
    /// Running launches and their stop signals
    pub launches: DashMap<LaunchId, CancellationToken>,
}

impl AppState {
    pub fn new(orchestrator: Arc<LaunchOrchestrator>) -> Self {
        Self {
            orchestrator,
            launches: DashMap::new(),
        }
    }

    /// Cancel every running launch and wait for them to clean up
    pub async fn shutdown(&self, grace: Duration) {
        for entry in self.launches.iter() {
            entry.value().cancel();
        }
        let deadline = tokio::time::Instant::now() + grace;
        while !self.launches.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if !self.launches.is_empty() {
            tracing::warn!("{} launch(es) still running at shutdown", self.launches.len());
        }
    }
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, orchestrator: Arc<LaunchOrchestrator>) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(orchestrator)),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    pub fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/launch", post(handlers::launch))
            .route("/status/:launch_id", get(handlers::get_status))
            .route("/getname", post(handlers::get_name))
            .route("/stop/:launch_id", post(handlers::stop_launch))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        TcpListener::bind(addr).await
    }

    /// Serve on `listener` until `shutdown` fires, then stop all launches
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
        tracing::info!("Control API listening on http://{}", listener.local_addr()?);
        let signal = shutdown.clone();
        axum::serve(listener, Self::router(self.state.clone()))
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await?;
        self.state.shutdown(Duration::from_secs(10)).await;
        Ok(())
    }
}
