//! Explicit conversion and concatenation endpoints

use axum::{extract::State, routing::post, Json, Router};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::api::decode_audio;
use crate::error::{ApiError, ApiResult};
use crate::services::transcoder::validate_output_format;
use crate::services::TranscodeError;
use crate::AppState;

fn default_output_format() -> String {
    "wav".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub audio_base64: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

#[derive(Debug, Deserialize)]
pub struct ConcatenateRequest {
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertedBody {
    pub success: bool,
    pub audio_base64: String,
    pub format: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct ToolFailureBody {
    pub success: bool,
    pub message: String,
}

/// Converted audio, or a structured tool failure
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AudioResponse {
    Converted(ConvertedBody),
    Failed(ToolFailureBody),
}

fn respond(result: Result<Vec<u8>, TranscodeError>, format: String) -> ApiResult<Json<AudioResponse>> {
    match result {
        Ok(bytes) => Ok(Json(AudioResponse::Converted(ConvertedBody {
            success: true,
            size: bytes.len(),
            audio_base64: general_purpose::STANDARD.encode(&bytes),
            format,
        }))),
        Err(e) if e.is_tool_failure() => {
            tracing::warn!(error = %e, "Audio tool failed");
            Ok(Json(AudioResponse::Failed(ToolFailureBody {
                success: false,
                message: e.to_string(),
            })))
        }
        Err(e) => {
            tracing::error!(error = %e, "Audio processing failed");
            Err(ApiError::from(e))
        }
    }
}

/// POST /api/audio/convert
pub async fn convert_audio(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> ApiResult<Json<AudioResponse>> {
    let format = validate_output_format(&request.output_format)?;
    let bytes = decode_audio(&request.audio_base64)?;

    let result = state.transcoder.convert(&bytes, &format).await;
    respond(result, format)
}

/// POST /api/audio/concatenate
pub async fn concatenate_audio(
    State(state): State<AppState>,
    Json(request): Json<ConcatenateRequest>,
) -> ApiResult<Json<AudioResponse>> {
    let format = validate_output_format(&request.output_format)?;
    if request.segments.is_empty() {
        return Err(TranscodeError::NoSegments.into());
    }

    let segments = request
        .segments
        .iter()
        .map(|segment| decode_audio(segment))
        .collect::<ApiResult<Vec<_>>>()?;

    let result = state.transcoder.concatenate(&segments, &format).await;
    respond(result, format)
}

/// Build audio processing routes
pub fn audio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audio/convert", post(convert_audio))
        .route("/api/audio/concatenate", post(concatenate_audio))
}
