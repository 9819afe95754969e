//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::constants::{DEFAULT_STATION_NAME, DEFAULT_TOPIC};
use crate::station::{Frequency, LaunchId, LaunchRequest, LaunchStatus, StatusRecord};
use crate::store;
use crate::ui::server::AppState;

/// Error body `{"error": ...}` with a status code
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    fn internal(msg: impl Into<String>) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

/// Frequencies arrive as strings or bare numbers
fn parse_frequency(value: &Value) -> Result<Frequency, ApiError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ApiError::bad_request("frequency must be a string or number")),
    };
    raw.parse().map_err(|e: crate::Error| ApiError::bad_request(e.to_string()))
}

#[derive(serde::Deserialize)]
pub struct LaunchBody {
    pub frequency: Value,
    pub stationname: Option<String>,
    pub param: Option<String>,
}

#[derive(serde::Serialize)]
pub struct LaunchResponse {
    pub status: LaunchStatus,
    pub launch_id: LaunchId,
}

/// Start a station in the background and hand back its launch id
pub async fn launch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LaunchBody>,
) -> Result<Json<LaunchResponse>, ApiError> {
    let frequency = parse_frequency(&body.frequency)?;
    let request = LaunchRequest {
        frequency,
        station_name: body
            .stationname
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STATION_NAME.to_string()),
        topic: body
            .param
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
        launch_id: LaunchId::generate(),
    };
    let launch_id = request.launch_id.clone();

    let cancel = CancellationToken::new();
    state.launches.insert(launch_id.clone(), cancel.clone());

    let task_state = state.clone();
    tokio::spawn(async move {
        let id = request.launch_id.clone();
        let report = task_state.orchestrator.run(request, cancel).await;
        task_state.launches.remove(&id);
        tracing::info!(
            launch_id = %id,
            segments = report.segments_streamed,
            "Launch finished: {}",
            report.state
        );
    });

    Ok(Json(LaunchResponse {
        status: LaunchStatus::Pending,
        launch_id,
    }))
}

/// Current status of a launch; unknown ids read as pending
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(launch_id): Path<String>,
) -> Result<Json<StatusRecord>, ApiError> {
    let launch_id: LaunchId = launch_id
        .parse()
        .map_err(|e: crate::Error| ApiError::bad_request(e.to_string()))?;
    let status = state.orchestrator.status().clone();
    store::blocking(move || status.read(&launch_id))
        .await
        .map(Json)
        .map_err(|e| ApiError::internal(e.to_string()))
}

#[derive(serde::Deserialize)]
pub struct NameRequest {
    pub frequency: Value,
}

/// Name of the station on a frequency
pub async fn get_name(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NameRequest>,
) -> Result<Json<Value>, ApiError> {
    let frequency = parse_frequency(&req.frequency)?;
    let registry = state.orchestrator.registry().clone();
    match store::blocking(move || registry.lookup(&frequency)).await {
        Ok(Some(record)) => Ok(Json(json!({ "name": record.name }))),
        Ok(None) => Ok(Json(json!({ "result": "false" }))),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

/// Stop a running broadcast
pub async fn stop_launch(
    State(state): State<Arc<AppState>>,
    Path(launch_id): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let launch_id: LaunchId = launch_id
        .parse()
        .map_err(|e: crate::Error| ApiError::bad_request(e.to_string()))?;
    match state.launches.get(&launch_id) {
        Some(entry) => {
            entry.value().cancel();
            tracing::info!(%launch_id, "Stop requested");
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "stopping" }))))
        }
        None => Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("no running launch {launch_id}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FakeTranscoder;
    use crate::config::StreamServerConfig;
    use crate::generator::ScriptedGenerator;
    use crate::network::{Clock, Streamer, TokioClock};
    use crate::orchestrator::LaunchOrchestrator;
    use crate::registry::FrequencyRegistry;
    use crate::status::StatusReporter;
    use crate::store::MemoryStore;
    use crate::ui::WebServer;
    use std::time::{Duration, Instant};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Server whose launches fail at connect: nothing listens on the stream port
    async fn spawn_api() -> (String, Arc<AppState>) {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);
        spawn_api_with(dead_port).await
    }

    /// Streaming server stand-in that accepts sources and drains them
    async fn spawn_sink() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    while matches!(sock.read(&mut buf).await, Ok(n) if n > 0) {}
                });
            }
        });
        port
    }

    async fn spawn_api_with(stream_port: u16) -> (String, Arc<AppState>) {
        let store = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let streamer = Streamer::new(
            StreamServerConfig {
                host: "127.0.0.1".into(),
                port: stream_port,
                ..StreamServerConfig::default()
            },
            clock.clone(),
        );
        let orchestrator = LaunchOrchestrator::new(
            Arc::new(FrequencyRegistry::new(store.clone())),
            Arc::new(StatusReporter::new(store)),
            Arc::new(ScriptedGenerator::new(24_000, 1, Duration::from_millis(250))),
            Arc::new(FakeTranscoder::new()),
            Arc::new(streamer),
            clock,
        );
        let state = Arc::new(AppState::new(Arc::new(orchestrator)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let router = WebServer::router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (base, state)
    }

    async fn start_launch(client: &reqwest::Client, base: &str, frequency: &str) -> String {
        let body: Value = client
            .post(format!("{base}/launch"))
            .json(&json!({"frequency": frequency, "stationname": "Tide FM", "param": "tides"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["launch_id"].as_str().unwrap().to_string()
    }

    /// Poll `/status` until `done` holds, for at most five seconds
    async fn wait_for_status(base: &str, launch_id: &str, done: impl Fn(&Value) -> bool) -> Value {
        let mut status = Value::Null;
        for _ in 0..250 {
            status = reqwest::get(format!("{base}/status/{launch_id}"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if done(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("launch {launch_id} stuck at {status}");
    }

    async fn wait_until_idle(state: &AppState) {
        for _ in 0..250 {
            if state.launches.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} launch(es) still running", state.launches.len());
    }

    fn is_free(state: &AppState, frequency: &str) -> bool {
        state
            .orchestrator
            .registry()
            .lookup(&frequency.parse().unwrap())
            .unwrap()
            .is_none()
    }

    #[tokio::test]
    async fn test_unknown_status_is_pending() {
        let (base, _) = spawn_api().await;
        let body: Value = reqwest::get(format!("{base}/status/12345"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "pending"}));
    }

    #[tokio::test]
    async fn test_getname() {
        let (base, state) = spawn_api().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/getname"))
            .json(&json!({"frequency": "101.1"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"result": "false"}));

        state
            .orchestrator
            .registry()
            .claim(&"101.1".parse().unwrap(), "Test")
            .unwrap();
        let body: Value = client
            .post(format!("{base}/getname"))
            .json(&json!({"frequency": 101.1}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"name": "Test"}));
    }

    #[tokio::test]
    async fn test_launch_is_fire_and_forget() {
        let (base, _) = spawn_api().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/launch"))
            .json(&json!({"frequency": "88.1", "stationname": "Tide FM", "param": "tide pools"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "pending");
        let launch_id = body["launch_id"].as_str().unwrap().to_string();

        // The stream port is closed, so the launch ends failed
        let status = wait_for_status(&base, &launch_id, |s| s["status"] == "failed").await;
        assert!(status["message"].as_str().unwrap().contains("Connection error"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_ends_broadcast_and_frees_frequency() {
        let sink = spawn_sink().await;
        let (base, state) = spawn_api_with(sink).await;
        let client = reqwest::Client::new();

        let launch_id = start_launch(&client, &base, "104.5").await;
        let live = wait_for_status(&base, &launch_id, |s| s["status"] != "pending").await;
        assert_eq!(live["status"], "success", "{live}");
        assert!(live["message"].as_str().unwrap().contains("is live"));
        assert!(!is_free(&state, "104.5"));

        let resp = client
            .post(format!("{base}/stop/{launch_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);

        let stopped = wait_for_status(&base, &launch_id, |s| s["message"] == "broadcast stopped").await;
        assert_eq!(stopped, json!({"status": "success", "message": "broadcast stopped"}));

        wait_until_idle(&state).await;
        assert!(is_free(&state, "104.5"));
        let name: Value = client
            .post(format!("{base}/getname"))
            .json(&json!({"frequency": "104.5"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(name, json!({"result": "false"}));

        // Finished launches are no longer stoppable
        let resp = client
            .post(format!("{base}/stop/{launch_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_every_launch() {
        let sink = spawn_sink().await;
        let (base, state) = spawn_api_with(sink).await;
        let client = reqwest::Client::new();

        let first = start_launch(&client, &base, "90.1").await;
        let second = start_launch(&client, &base, "90.3").await;
        for id in [&first, &second] {
            wait_for_status(&base, id, |s| s["status"] == "success").await;
        }
        assert_eq!(state.launches.len(), 2);

        state.shutdown(Duration::from_secs(5)).await;
        assert!(state.launches.is_empty());
        for id in [&first, &second] {
            let status = wait_for_status(&base, id, |s| s["message"] == "broadcast stopped").await;
            assert_eq!(status["status"], "success");
        }
        assert!(is_free(&state, "90.1"));
        assert!(is_free(&state, "90.3"));
    }

    #[tokio::test]
    async fn test_shutdown_when_idle_returns_at_once() {
        let (_, state) = spawn_api().await;
        let started = Instant::now();
        state.shutdown(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (base, _) = spawn_api().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/launch"))
            .json(&json!({"frequency": "../../etc"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = client
            .post(format!("{base}/stop/not-running"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
