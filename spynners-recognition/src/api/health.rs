//! Health check and service banner

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy")
    pub status: String,
    pub service: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether fingerprint credentials are present; recognition answers 503 otherwise
    pub fingerprint_configured: bool,
    /// Last upstream failure, for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let uptime_seconds = now.signed_duration_since(state.startup_time).num_seconds().max(0) as u64;
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "spynners-recognition".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        fingerprint_configured: state.orchestrator.is_configured(),
        last_error,
        timestamp: now.to_rfc3339(),
    })
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "SPYNNERS recognition API - use /api/* endpoints" }))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health_check))
}
