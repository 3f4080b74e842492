//! HTTP endpoints for the device telemetry agent.
//!
//! This module provides two servers:
//! - A wake listener that accepts inbound wake signals via `POST /wake` and
//!   answers with the run's completion signal
//! - A reference collector implementing `POST /flask-api/device-data` and
//!   `DELETE /flask-api/clear`, which appends received snapshots to a JSON
//!   Lines file
//!
//! # Architecture
//!
//! ```text
//! push sender ──→ POST /wake ──→ agent ──→ POST /flask-api/device-data ──→ collector
//!                                                                              ↓
//!                                                                     device_data.jsonl
//! ```

use crate::agent::TelemetryAgent;
use crate::trigger::{FetchResult, WakeSignal};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tower_http::trace::TraceLayer;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from the wake endpoint
#[derive(Debug, Serialize)]
pub struct WakeResponse {
    pub result: FetchResult,
}

/// Message response from the collector
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response from the collector
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type CollectorResult = Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)>;

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /wake
///
/// Runs the pipeline when the payload carries the content-available marker
/// and returns once the run has completed. Any body is accepted; one that is
/// not JSON carries no marker and is acknowledged as `noData`.
async fn wake(State(agent): State<TelemetryAgent>, body: Bytes) -> Json<WakeResponse> {
    let payload = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, bytes = body.len(), "wake payload is not JSON");
        serde_json::Value::Null
    });
    let result = agent.handle_wake(WakeSignal::new(payload)).await;
    Json(WakeResponse { result })
}

/// Router for the wake listener.
pub fn wake_router(agent: TelemetryAgent) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/wake", post(wake))
        .layer(TraceLayer::new_for_http())
        .with_state(agent)
}

/// Bind the wake listener on localhost and serve it in the background.
///
/// Returns the bound address and a sender that shuts the server down.
pub async fn run_wake_listener(
    agent: TelemetryAgent,
    port: u16,
) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    serve(wake_router(agent), port, "wake listener").await
}

/// Reference collector configuration
#[derive(Debug, Clone)]
pub struct CollectorServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// JSON Lines file that receives every posted snapshot
    pub data_file: PathBuf,
    /// Directory emptied by `DELETE /flask-api/clear`
    pub output_dir: PathBuf,
}

impl CollectorServerConfig {
    pub fn new(port: u16, data_file: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            port,
            data_file,
            output_dir,
        }
    }
}

/// Shared collector state
pub struct CollectorState {
    data_file: PathBuf,
    output_dir: PathBuf,
    /// Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl CollectorState {
    pub fn new(config: &CollectorServerConfig) -> Self {
        Self {
            data_file: config.data_file.clone(),
            output_dir: config.output_dir.clone(),
            write_lock: Mutex::new(()),
        }
    }
}

fn collector_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn is_empty_json(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
    }
}

/// POST /flask-api/device-data
///
/// Appends the JSON body as one line to the data file.
async fn store_device_data(State(state): State<Arc<CollectorState>>, body: Bytes) -> CollectorResult {
    let data: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            collector_error(StatusCode::BAD_REQUEST, format!("Invalid JSON data: {e}"))
        })?
    };

    if is_empty_json(&data) {
        return Err(collector_error(StatusCode::BAD_REQUEST, "Missing JSON data"));
    }

    let line = serde_json::to_string(&data)
        .map_err(|e| collector_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let _guard = state.write_lock.lock().await;
    let written = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&state.data_file)
        .and_then(|mut file| writeln!(file, "{line}"));

    if let Err(e) = written {
        tracing::error!(path = ?state.data_file, error = %e, "failed to store device data");
        return Err(collector_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
    }

    tracing::info!(path = ?state.data_file, bytes = line.len(), "device data stored");
    Ok(Json(MessageResponse {
        message: "Device data stored successfully".to_string(),
    }))
}

/// DELETE /flask-api/clear
///
/// Removes the files (not subdirectories) in the output directory.
async fn clear(State(state): State<Arc<CollectorState>>) -> CollectorResult {
    if !state.output_dir.exists() {
        return Ok(Json(MessageResponse {
            message: "Output directory does not exist".to_string(),
        }));
    }

    let cleared = std::fs::read_dir(&state.output_dir).and_then(|entries| {
        for entry in entries {
            let path = entry?.path();
            let meta = std::fs::symlink_metadata(&path)?;
            if meta.is_file() || meta.file_type().is_symlink() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    });

    match cleared {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Output directory cleared".to_string(),
        })),
        Err(e) => Err(collector_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error clearing output directory: {e}"),
        )),
    }
}

/// Router for the reference collector.
pub fn collector_router(state: Arc<CollectorState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/flask-api/device-data", post(store_device_data))
        .route("/flask-api/clear", delete(clear))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the reference collector in the background.
pub async fn run_collector(
    config: CollectorServerConfig,
) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    let state = Arc::new(CollectorState::new(&config));
    serve(collector_router(state), config.port, "collector").await
}

async fn serve(
    app: Router,
    port: u16,
    name: &'static str,
) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("{} listening on http://{}", name, actual_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                tracing::info!("{} shutdown signal received", name);
            })
            .await
        {
            tracing::error!("{} server error: {}", name, e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
