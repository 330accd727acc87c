//! HTTP surface integration tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against fake
//! fingerprint/catalog collaborators and an in-memory database.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use helpers::{bearer, encode, test_app, FakeCatalog, FakeFingerprint};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn recognize(text: &str) -> Request<Body> {
    post_json("/api/recognize-audio", json!({ "audio_base64": encode(text) }), None)
}

#[tokio::test]
async fn test_root_banner() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("SPYNNERS"));
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["fingerprint_configured"], true);
    assert!(body.get("last_error").is_none());

    let app = test_app(FakeFingerprint::unconfigured(), FakeCatalog::default()).await;
    let (_, body) = send(&app, get("/api/health")).await;
    assert_eq!(body["fingerprint_configured"], false);
}

#[tokio::test]
async fn test_unconfigured_recognition_is_503() {
    let app = test_app(FakeFingerprint::unconfigured(), FakeCatalog::default()).await;
    let (status, body) = send(&app, recognize("Sunrise")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_invalid_base64_is_400() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let request = post_json("/api/recognize-audio", json!({ "audio_base64": "%%% not audio" }), None);
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unrecognized_is_200_with_status() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let (status, body) = send(&app, recognize("none")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Could not identify the track");
    assert_eq!(body["status"]["code"], 1001);
}

#[tokio::test]
async fn test_fuzzy_match_enriches_result() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::with_sunrise()).await;
    let (status, body) = send(&app, recognize("Sunrise (Extended Mix)")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["title"], "Sunrise (Extended Mix)");
    assert_eq!(body["artist"], "Kygo");
    assert_eq!(body["is_spynners_track"], true);
    assert_eq!(body["match_source"], "fuzzy");
    assert_eq!(body["catalog_id"], "t2");
    assert_eq!(body["producer_email"], "producer@example.com");
    assert_eq!(body["cover_image"], "https://img/2.jpg");
    assert_eq!(body["play_offset_ms"], 10_000);
}

#[tokio::test]
async fn test_unmatched_title_returns_fingerprint_only_result() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::with_sunrise()).await;
    let (status, body) = send(&app, recognize("Zzyzx")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["is_spynners_track"], false);
    assert!(body.get("catalog_id").is_none());
}

#[tokio::test]
async fn test_direct_match_uses_inline_catalog_fields() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::with_sunrise()).await;
    let (status, body) = send(&app, recognize("direct:Catalog Song")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match_source"], "direct");
    assert_eq!(body["catalog_id"], "track-9");
    assert_eq!(body["bpm"], 124.0);
    assert_eq!(body["producer_email"], "producer@example.com");
}

#[tokio::test]
async fn test_transport_failure_is_500_and_recorded_in_health() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let (status, body) = send(&app, recognize("fail")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "RECOGNITION_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Recognition failed:"));

    let (_, health) = send(&app, get("/api/health")).await;
    assert!(health["last_error"].as_str().unwrap().contains("connection failed"));
}

#[tokio::test]
async fn test_history_is_keyed_by_bearer_user() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::with_sunrise()).await;
    let auth = bearer("user-42");

    let request = post_json(
        "/api/recognize-audio",
        json!({ "audio_base64": encode("Sunrise") }),
        Some(&auth),
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // No bearer: recognized but not stored
    send(&app, recognize("Sunrise")).await;

    let request = Request::builder()
        .uri("/api/recognition-history?limit=10")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["user_id"], "user-42");
    assert_eq!(history[0]["result"]["title"], "Sunrise");

    let (status, _) = send(&app, get("/api/recognition-history")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_offline_batch_isolates_failures() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::with_sunrise()).await;
    let request = post_json(
        "/api/offline-sessions/process",
        json!({
            "recordings": [
                { "audio_base64": encode("Sunrise"), "timestamp": "2024-06-01T22:00:00Z" },
                { "audio_base64": encode("fail"), "timestamp": "2024-06-01T22:05:00Z" },
                { "audio_base64": "!!!", "timestamp": "2024-06-01T22:10:00Z" },
                { "audio_base64": encode("Zzyzx") },
                { "audio_base64": format!("data:audio/m4a;base64,{}", encode("Sunrise")) }
            ]
        }),
        None,
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 5);
    assert_eq!(body["recognized_count"], 3);
    assert_eq!(body["identified_count"], 2);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["result"]["catalog_id"], "t2");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["timestamp"], "2024-06-01T22:05:00Z");
    assert_eq!(results[2]["message"], "Invalid audio data");
    assert_eq!(results[3]["index"], 3);
    assert_eq!(results[4]["success"], true);
    assert_eq!(results[4]["result"]["catalog_id"], "t2");
}

#[tokio::test]
async fn test_offline_batch_unconfigured_is_503() {
    let app = test_app(FakeFingerprint::unconfigured(), FakeCatalog::default()).await;
    let request = post_json(
        "/api/offline-sessions/process",
        json!({ "recordings": [{ "audio_base64": encode("Sunrise") }] }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_convert_rejects_unsupported_format() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let request = post_json(
        "/api/audio/convert",
        json!({ "audio_base64": encode("RIFF"), "output_format": "exe" }),
        None,
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_concatenate_requires_segments() {
    let app = test_app(FakeFingerprint::configured(), FakeCatalog::default()).await;
    let request = post_json(
        "/api/audio/concatenate",
        json!({ "segments": [], "output_format": "mp3" }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[cfg(unix)]
#[tokio::test]
async fn test_convert_tool_failure_is_structured() {
    use spynners_recognition::config::TranscoderConfig;

    let transcoder = TranscoderConfig {
        tool_path: "false".into(),
        ..TranscoderConfig::default()
    };
    let app = helpers::test_app_with(FakeFingerprint::configured(), FakeCatalog::default(), transcoder).await;
    let request = post_json(
        "/api/audio/convert",
        json!({ "audio_base64": encode("RIFF0000WAVE"), "output_format": "mp3" }),
        None,
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_convert_missing_tool_is_500() {
    use spynners_recognition::config::TranscoderConfig;

    let transcoder = TranscoderConfig {
        tool_path: "/nonexistent/ffmpeg".into(),
        ..TranscoderConfig::default()
    };
    let app = helpers::test_app_with(FakeFingerprint::configured(), FakeCatalog::default(), transcoder).await;
    let request = post_json(
        "/api/audio/convert",
        json!({ "audio_base64": encode("RIFF0000WAVE"), "output_format": "mp3" }),
        None,
    );
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
