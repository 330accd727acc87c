//! spynners-recognition library interface
//!
//! Exposes the router and service components for the binary and for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use db::SqliteHistoryStore;
use services::{AudioTranscoder, RecognitionOrchestrator};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RecognitionOrchestrator>,
    /// Used directly by the explicit convert/concatenate endpoints
    pub transcoder: Arc<AudioTranscoder>,
    pub history: Arc<SqliteHistoryStore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last upstream failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<RecognitionOrchestrator>,
        transcoder: Arc<AudioTranscoder>,
        history: Arc<SqliteHistoryStore>,
    ) -> Self {
        Self {
            orchestrator,
            transcoder,
            history,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
///
/// CORS is permissive: the mobile app and its web preview call the service directly.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::recognition_routes())
        .merge(api::audio_routes())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
