//! HTTP-facing error type
//!
//! Every error body has the shape `{"success": false, "error": {"code", "message"}}`.

use crate::services::{RecognitionError, TranscodeError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or unusable bearer identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Required upstream not configured (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Fingerprint transport failure (500)
    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// spynners-common error
    #[error("Common error: {0}")]
    Common(#[from] spynners_common::Error),
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::NotConfigured => {
                ApiError::ServiceUnavailable("Fingerprint service not configured".to_string())
            }
            RecognitionError::Identify(e) => ApiError::RecognitionFailed(e.to_string()),
        }
    }
}

impl From<TranscodeError> for ApiError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::UnsupportedFormat(_) | TranscodeError::NoSegments => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::RecognitionFailed(ref detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RECOGNITION_FAILED",
                format!("Recognition failed: {}", detail),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
