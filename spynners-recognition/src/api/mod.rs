//! HTTP API handlers for the recognition service

pub mod audio;
pub mod auth;
pub mod health;
pub mod recognition;

pub use audio::audio_routes;
pub use health::health_routes;
pub use recognition::recognition_routes;

use crate::error::{ApiError, ApiResult};
use crate::models::decode_base64_audio;

/// Decode a request's base64 audio payload, rejecting bad input with 400
pub fn decode_audio(encoded: &str) -> ApiResult<Vec<u8>> {
    decode_base64_audio(encoded).map_err(|e| ApiError::BadRequest(e.to_string()))
}
