//! Recognition endpoints: single sample, offline session batch, history

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{auth::bearer_user_id, decode_audio};
use crate::error::{ApiError, ApiResult};
use crate::models::{BatchSummary, MatchResult, OfflineRecording, RecognitionHistoryRecord, ServiceStatus};
use crate::services::recognition::NOT_RECOGNIZED_MESSAGE;
use crate::services::{RecognitionError, RecognitionOutcome};
use crate::AppState;

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    pub audio_base64: String,
}

/// Recognized result flattened next to `success`
#[derive(Debug, Serialize)]
pub struct RecognizedBody {
    pub success: bool,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Clean non-match, echoing the fingerprint service status
#[derive(Debug, Serialize)]
pub struct UnrecognizedBody {
    pub success: bool,
    pub message: String,
    pub status: ServiceStatus,
}

/// Response of POST /api/recognize-audio
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RecognizeResponse {
    Recognized(RecognizedBody),
    Unrecognized(UnrecognizedBody),
}

#[derive(Debug, Deserialize)]
pub struct OfflineBatchRequest {
    #[serde(default)]
    pub recordings: Vec<OfflineRecording>,
}

#[derive(Debug, Serialize)]
pub struct OfflineBatchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<RecognitionHistoryRecord>,
}

/// Remember upstream failures for the health endpoint
async fn note_failure(state: &AppState, err: &RecognitionError) {
    if let RecognitionError::Identify(e) = err {
        *state.last_error.write().await = Some(format!("Recognition failed: {}", e));
    }
}

/// POST /api/recognize-audio
pub async fn recognize_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RecognizeRequest>,
) -> ApiResult<Json<RecognizeResponse>> {
    if !state.orchestrator.is_configured() {
        return Err(RecognitionError::NotConfigured.into());
    }

    let bytes = decode_audio(&request.audio_base64)?;
    let user_id = bearer_user_id(&headers);

    match state.orchestrator.recognize(bytes, user_id.as_deref()).await {
        Ok(RecognitionOutcome::Recognized(result)) => Ok(Json(RecognizeResponse::Recognized(RecognizedBody {
            success: true,
            result,
        }))),
        Ok(RecognitionOutcome::Unrecognized(status)) => Ok(Json(RecognizeResponse::Unrecognized(UnrecognizedBody {
            success: false,
            message: NOT_RECOGNIZED_MESSAGE.to_string(),
            status,
        }))),
        Err(e) => {
            tracing::error!(error = %e, "Recognition failed");
            note_failure(&state, &e).await;
            Err(e.into())
        }
    }
}

/// POST /api/offline-sessions/process
pub async fn process_offline_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OfflineBatchRequest>,
) -> ApiResult<Json<OfflineBatchResponse>> {
    let user_id = bearer_user_id(&headers);

    let summary = state
        .orchestrator
        .process_batch(request.recordings, user_id.as_deref())
        .await
        .map_err(ApiError::from)?;

    Ok(Json(OfflineBatchResponse {
        success: true,
        summary,
    }))
}

/// GET /api/recognition-history
pub async fn recognition_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let user_id = bearer_user_id(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Valid bearer token required".to_string()))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let history = state.history.list_for_user(&user_id, limit).await?;

    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

/// Build recognition routes
pub fn recognition_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recognize-audio", post(recognize_audio))
        .route("/api/offline-sessions/process", post(process_offline_session))
        .route("/api/recognition-history", get(recognition_history))
}
