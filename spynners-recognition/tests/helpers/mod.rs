//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use spynners_recognition::config::{BatchConfig, MatchingConfig, TranscoderConfig};
use spynners_recognition::db::{self, SqliteHistoryStore};
use spynners_recognition::models::{
    AudioSample, CatalogEntry, DirectCatalogFields, FingerprintCandidate, ServiceStatus,
};
use spynners_recognition::services::fingerprint_client::{IdentifyOutcome, LookupScope};
use spynners_recognition::services::{
    AudioTranscoder, CatalogError, CatalogMatcher, CatalogService, FingerprintError,
    FingerprintService, RecognitionOrchestrator,
};
use spynners_recognition::{build_router, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Single-connection in-memory database with the service schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

pub fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

pub fn bearer(user_id: &str) -> String {
    format!("Bearer {}", general_purpose::STANDARD.encode(format!("{}:1700000000", user_id)))
}

/// Fingerprint fake scripted by sample content
///
/// - `fail`: transport failure
/// - `none`: service status 1001
/// - `direct:<title>`: custom-file hit linked to catalog track `track-9`
/// - anything else: commercial hit with that title by "Kygo"
pub struct FakeFingerprint {
    pub configured: bool,
    pub calls: AtomicUsize,
}

impl FakeFingerprint {
    pub fn configured() -> Self {
        Self {
            configured: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            calls: AtomicUsize::new(0),
        }
    }
}

fn candidate(title: &str, direct: bool) -> FingerprintCandidate {
    FingerprintCandidate {
        fingerprint_id: Some("acr-1".to_string()),
        title: title.to_string(),
        artist: "Kygo".to_string(),
        album: "Dawn".to_string(),
        genre: Some("House".to_string()),
        genres: vec!["House".to_string()],
        release_date: None,
        label: None,
        duration_ms: 200_000,
        confidence_score: 100.0,
        play_offset_ms: Some(10_000),
        external_ids: None,
        direct_catalog_fields: direct.then(|| DirectCatalogFields {
            catalog_track_id: Some("track-9".to_string()),
            producer_id: Some("p1".to_string()),
            artwork_url: Some("https://img/9.jpg".to_string()),
            isrc: None,
            bpm: Some(124.0),
        }),
    }
}

#[async_trait]
impl FingerprintService for FakeFingerprint {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn identify(
        &self,
        sample: &AudioSample,
        _scope: LookupScope,
    ) -> Result<IdentifyOutcome, FingerprintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = String::from_utf8_lossy(&sample.bytes).to_string();
        if text == "fail" {
            return Err(FingerprintError::Network("connection failed".to_string()));
        }
        if text == "none" {
            return Ok(IdentifyOutcome::Unrecognized(ServiceStatus {
                code: 1001,
                msg: "No result".to_string(),
            }));
        }
        if let Some(title) = text.strip_prefix("direct:") {
            return Ok(IdentifyOutcome::Recognized(candidate(title, true)));
        }
        Ok(IdentifyOutcome::Recognized(candidate(&text, false)))
    }
}

/// In-memory catalog
#[derive(Default)]
pub struct FakeCatalog {
    pub entries: Vec<CatalogEntry>,
    pub emails: HashMap<String, String>,
    pub fingerprint_ids: Mutex<HashMap<String, String>>,
}

impl FakeCatalog {
    pub fn with_sunrise() -> Self {
        let mut emails = HashMap::new();
        emails.insert("p1".to_string(), "producer@example.com".to_string());
        Self {
            entries: vec![
                CatalogEntry {
                    catalog_id: "t1".to_string(),
                    title: "Ocean Waves".to_string(),
                    producer_name: Some("Deadmau5".to_string()),
                    ..Default::default()
                },
                CatalogEntry {
                    catalog_id: "t2".to_string(),
                    title: "Sunrise".to_string(),
                    producer_name: Some("Kygo".to_string()),
                    producer_id: Some("p1".to_string()),
                    artwork_url: Some("https://img/2.jpg".to_string()),
                    ..Default::default()
                },
            ],
            emails,
            fingerprint_ids: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn find_by_fingerprint_id(
        &self,
        fingerprint_id: &str,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .entries
            .iter()
            .find(|e| e.fingerprint_id.as_deref() == Some(fingerprint_id))
            .cloned())
    }

    async fn list_tracks(&self, limit: usize) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.entries.iter().take(limit).cloned().collect())
    }

    async fn set_fingerprint_id(
        &self,
        catalog_id: &str,
        fingerprint_id: &str,
    ) -> Result<(), CatalogError> {
        self.fingerprint_ids
            .lock()
            .unwrap()
            .insert(catalog_id.to_string(), fingerprint_id.to_string());
        Ok(())
    }

    async fn producer_email(&self, producer_id: &str) -> Result<Option<String>, CatalogError> {
        Ok(self.emails.get(producer_id).cloned())
    }
}

/// Router wired with fakes, an in-memory database and the given transcoder settings
pub async fn test_app_with(
    fingerprint: FakeFingerprint,
    catalog: FakeCatalog,
    transcoder: TranscoderConfig,
) -> Router {
    let history = Arc::new(SqliteHistoryStore::new(memory_pool().await));
    let transcoder = Arc::new(AudioTranscoder::new(&transcoder));
    let catalog = Arc::new(catalog);
    let matcher = Arc::new(CatalogMatcher::new(catalog.clone(), &MatchingConfig::default()));

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        transcoder.clone(),
        Arc::new(fingerprint),
        matcher,
        catalog,
        history.clone(),
        &BatchConfig::default(),
    ));

    build_router(AppState::new(orchestrator, transcoder, history), MAX_BODY_BYTES)
}

pub async fn test_app(fingerprint: FakeFingerprint, catalog: FakeCatalog) -> Router {
    test_app_with(fingerprint, catalog, TranscoderConfig::default()).await
}
