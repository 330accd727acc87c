//! Fingerprint client against a local stand-in for the identify endpoint

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use spynners_recognition::config::{FingerprintConfig, FingerprintCredentials};
use spynners_recognition::models::AudioSample;
use spynners_recognition::services::audio_format;
use spynners_recognition::services::fingerprint_client::{IdentifyOutcome, LookupScope};
use spynners_recognition::services::{FingerprintClient, FingerprintError, FingerprintService};
use std::sync::{Arc, Mutex};

type Captured = Arc<Mutex<Option<String>>>;

/// Serve `router` on an ephemeral port, returning its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: String) -> FingerprintClient {
    let config = FingerprintConfig {
        base_url,
        timeout_secs: 5,
        ..FingerprintConfig::default()
    };
    let credentials = FingerprintCredentials {
        access_key: "test_key".to_string(),
        access_secret: "test_secret".to_string(),
    };
    FingerprintClient::new(&config, Some(credentials)).unwrap()
}

fn wav_sample() -> AudioSample {
    let bytes = b"RIFF\x10\x00\x00\x00WAVEfmt data".to_vec();
    let detected = audio_format::detect(&bytes, "m4a");
    AudioSample::new(bytes, detected)
}

async fn capture_identify(State(captured): State<Captured>, body: Bytes) -> Json<Value> {
    *captured.lock().unwrap() = Some(String::from_utf8_lossy(&body).to_string());
    Json(json!({
        "status": {"code": 0, "msg": "Success"},
        "metadata": {
            "played_duration": 7,
            "music": [{
                "acrid": "acr-77",
                "title": "Sunrise",
                "artists": [{"name": "Kygo"}],
                "album": {"name": "Dawn"},
                "score": 88
            }]
        }
    }))
}

#[tokio::test]
async fn test_identify_submits_signed_multipart() {
    let captured: Captured = Arc::new(Mutex::new(None));
    let router = Router::new()
        .route("/v1/identify", post(capture_identify))
        .with_state(captured.clone());
    let client = client(serve(router).await);

    let outcome = client.identify(&wav_sample(), LookupScope::Standard).await.unwrap();
    let IdentifyOutcome::Recognized(candidate) = outcome else {
        panic!("expected a recognized candidate");
    };
    assert_eq!(candidate.title, "Sunrise");
    assert_eq!(candidate.fingerprint_id.as_deref(), Some("acr-77"));
    assert_eq!(candidate.play_offset_ms, Some(7_000));

    let body = captured.lock().unwrap().clone().unwrap();
    for field in [
        "access_key",
        "sample_bytes",
        "timestamp",
        "signature",
        "data_type",
        "signature_version",
    ] {
        assert!(body.contains(&format!("name=\"{}\"", field)), "missing field {}", field);
    }
    assert!(body.contains("test_key"));
    assert!(body.contains("filename=\"sample.wav\""));
    assert!(body.contains("audio/wav"));
    assert!(!body.contains("test_secret"));
}

#[tokio::test]
async fn test_non_success_status_is_unrecognized() {
    let router = Router::new().route(
        "/v1/identify",
        post(|| async { Json(json!({"status": {"code": 1001, "msg": "No result"}})) }),
    );
    let client = client(serve(router).await);

    let outcome = client.identify(&wav_sample(), LookupScope::Standard).await.unwrap();
    match outcome {
        IdentifyOutcome::Unrecognized(status) => {
            assert_eq!(status.code, 1001);
            assert_eq!(status.msg, "No result");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_is_transport_failure() {
    let router = Router::new().route(
        "/v1/identify",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let client = client(serve(router).await);

    let err = client.identify(&wav_sample(), LookupScope::Standard).await.unwrap_err();
    assert!(matches!(err, FingerprintError::Http(502)));
}

#[tokio::test]
async fn test_unparseable_body_is_parse_error() {
    let router = Router::new().route("/v1/identify", post(|| async { "<html>oops</html>" }));
    let client = client(serve(router).await);

    let err = client.identify(&wav_sample(), LookupScope::Standard).await.unwrap_err();
    assert!(matches!(err, FingerprintError::Parse(_)));
}
