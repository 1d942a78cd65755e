//! HTTP surface of the match server.
//!
//! The remote-object transport shares its listener with a health check:
//!
//! - `GET /health` - Server health status
//! - `GET /{object_name}` - WebSocket upgrade to the named remote object
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use codex_server::api::{create_router, AppState};
//! # async fn example(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:1099").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod remote;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use codex::{CoordinatorHandle, TransportConfig, net::connection::SharedSink};
use serde_json::json;
use std::sync::Arc;

/// Application state shared across all HTTP handlers and remote connections.
#[derive(Clone)]
pub struct AppState {
    /// Coordinator queried by the health check
    pub coordinator: CoordinatorHandle,
    /// Where remote connections report their events
    pub sink: SharedSink,
    pub transport: TransportConfig,
    /// Path segment the remote object answers on
    pub object_name: Arc<str>,
}

/// Create the router for the remote transport listener.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/{object_name}", get(remote::remote_handler))
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` while the coordinator answers, or
/// `503 Service Unavailable` once it stopped.
///
/// # Example
///
/// ```bash
/// curl http://localhost:1099/health
/// # {"status":"healthy","version":"1.0.0","online":2,"phase":"play","timestamp":"2026-10-18T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.coordinator.snapshot().await {
        Some(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "online": snapshot.online,
                "phase": snapshot.phase.to_string(),
                "matches_completed": snapshot.matches_completed,
                "timestamp": timestamp,
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": timestamp,
            })),
        ),
    }
}
