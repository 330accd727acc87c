//! Fingerprint service client (ACRCloud identify protocol)
//!
//! Requests are signed with HMAC-SHA1 over a newline-joined canonical string
//! and submitted as multipart form data. The signing scheme is fixed by the
//! service and must be reproduced bit-for-bit.
//!
//! Two failure classes are kept apart:
//! - transport problems (timeout, connection, non-2xx, unreadable body) are
//!   `Err(FingerprintError)`
//! - a structured non-zero `status.code` is `Ok(IdentifyOutcome::Unrecognized)`

use crate::config::{FingerprintConfig, FingerprintCredentials};
use crate::models::{AudioSample, DirectCatalogFields, FingerprintCandidate, ServiceStatus};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sha1::Sha1;
use std::time::Duration;
use thiserror::Error;

pub const IDENTIFY_URI: &str = "/v1/identify";
pub const HTTP_METHOD: &str = "POST";
pub const DATA_TYPE: &str = "audio";
pub const SIGNATURE_VERSION: &str = "1";
const USER_AGENT: &str = "SPYNNERS-Recognition/0.1.0";

/// Fingerprint client errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Fingerprint service credentials not configured")]
    NotConfigured,

    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Could not build request: {0}")]
    Request(String),

    #[error("Fingerprint service timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Fingerprint service returned HTTP {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result of a transport-successful identify call
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifyOutcome {
    Recognized(FingerprintCandidate),
    Unrecognized(ServiceStatus),
}

/// Which metadata buckets may produce a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupScope {
    /// `custom_files`, then `music`
    Standard,
    /// `custom_files`, then `music`, then `humming` (offline batches)
    IncludeHumming,
}

/// Capability to identify an audio sample
#[async_trait]
pub trait FingerprintService: Send + Sync {
    /// Whether credentials are present; unconfigured services fail before any network call
    fn is_configured(&self) -> bool;

    async fn identify(
        &self,
        sample: &AudioSample,
        scope: LookupScope,
    ) -> Result<IdentifyOutcome, FingerprintError>;
}

/// Compute the request signature
///
/// `base64(hmac_sha1(secret, "METHOD\nURI\nACCESS_KEY\nDATA_TYPE\nSIG_VERSION\nTIMESTAMP"))`
pub fn sign(
    http_method: &str,
    http_uri: &str,
    access_key: &str,
    data_type: &str,
    signature_version: &str,
    timestamp: &str,
    access_secret: &str,
) -> Result<String, FingerprintError> {
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        http_method, http_uri, access_key, data_type, signature_version, timestamp
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(access_secret.as_bytes())
        .map_err(|_| FingerprintError::InvalidKey)?;
    mac.update(string_to_sign.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Wire types
// ============================================================================

/// Raw identify response
#[derive(Debug, Default, Deserialize)]
pub struct IdentifyResponse {
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub metadata: Option<IdentifyMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IdentifyMetadata {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub custom_files: Vec<CustomFileHit>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub music: Vec<MusicHit>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub humming: Vec<MusicHit>,
    /// Seconds of the sample that were played/matched
    #[serde(default)]
    pub played_duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

/// Hit from the commercial or humming index
#[derive(Debug, Default, Deserialize)]
pub struct MusicHit {
    pub acrid: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub artists: Vec<NamedRef>,
    pub album: Option<NamedRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub genres: Vec<NamedRef>,
    pub release_date: Option<String>,
    pub label: Option<String>,
    pub duration_ms: Option<f64>,
    pub score: Option<f64>,
    pub play_offset_ms: Option<f64>,
    pub external_ids: Option<Value>,
}

/// Hit against a reference file registered by the catalog owner
///
/// Catalog linkage travels as user-defined fields on the reference.
#[derive(Debug, Default, Deserialize)]
pub struct CustomFileHit {
    pub acrid: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "producer_name")]
    pub artist: Option<String>,
    pub audio_id: Option<String>,
    #[serde(alias = "track_id")]
    pub spynners_track_id: Option<String>,
    pub producer_id: Option<String>,
    #[serde(alias = "cover_image")]
    pub artwork_url: Option<String>,
    pub genre: Option<String>,
    #[serde(alias = "isrc_code")]
    pub isrc: Option<String>,
    pub bpm: Option<Value>,
    pub duration_ms: Option<f64>,
    pub score: Option<f64>,
    pub play_offset_ms: Option<f64>,
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn to_millis(value: Option<f64>) -> Option<u64> {
    value.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
}

impl MusicHit {
    fn to_candidate(&self, played_offset_ms: Option<u64>) -> FingerprintCandidate {
        let artist = self
            .artists
            .iter()
            .map(|a| a.name.trim())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let genres: Vec<String> = self
            .genres
            .iter()
            .map(|g| g.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        FingerprintCandidate {
            fingerprint_id: non_blank(self.acrid.as_deref()),
            title: non_blank(self.title.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
            artist: if artist.is_empty() { "Unknown".to_string() } else { artist },
            album: self
                .album
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            genre: genres.first().cloned(),
            genres,
            release_date: non_blank(self.release_date.as_deref()),
            label: non_blank(self.label.as_deref()),
            duration_ms: to_millis(self.duration_ms).unwrap_or(0),
            confidence_score: self.score.unwrap_or(0.0),
            play_offset_ms: to_millis(self.play_offset_ms).or(played_offset_ms),
            external_ids: self.external_ids.clone(),
            direct_catalog_fields: None,
        }
    }
}

impl CustomFileHit {
    fn to_candidate(&self, played_offset_ms: Option<u64>) -> FingerprintCandidate {
        let bpm = match &self.bpm {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        let genre = non_blank(self.genre.as_deref());

        FingerprintCandidate {
            fingerprint_id: non_blank(self.acrid.as_deref()),
            title: non_blank(self.title.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
            artist: non_blank(self.artist.as_deref()).unwrap_or_else(|| "Unknown".to_string()),
            album: String::new(),
            genres: genre.iter().cloned().collect(),
            genre,
            release_date: None,
            label: None,
            duration_ms: to_millis(self.duration_ms).unwrap_or(0),
            confidence_score: self.score.unwrap_or(0.0),
            play_offset_ms: to_millis(self.play_offset_ms).or(played_offset_ms),
            external_ids: None,
            direct_catalog_fields: Some(DirectCatalogFields {
                catalog_track_id: non_blank(self.spynners_track_id.as_deref())
                    .or_else(|| non_blank(self.audio_id.as_deref())),
                producer_id: non_blank(self.producer_id.as_deref()),
                artwork_url: non_blank(self.artwork_url.as_deref()),
                isrc: non_blank(self.isrc.as_deref()),
                bpm,
            }),
        }
    }
}

/// Turn a decoded response into an outcome
///
/// Buckets are consulted in strict priority order and the first entry of the
/// first non-empty bucket wins.
pub fn interpret_response(response: IdentifyResponse, scope: LookupScope) -> IdentifyOutcome {
    if !response.status.is_success() {
        return IdentifyOutcome::Unrecognized(response.status);
    }

    let metadata = response.metadata.unwrap_or_default();
    let played_offset_ms = to_millis(metadata.played_duration.map(|secs| secs * 1000.0));

    if let Some(hit) = metadata.custom_files.first() {
        return IdentifyOutcome::Recognized(hit.to_candidate(played_offset_ms));
    }
    if let Some(hit) = metadata.music.first() {
        return IdentifyOutcome::Recognized(hit.to_candidate(played_offset_ms));
    }
    if scope == LookupScope::IncludeHumming {
        if let Some(hit) = metadata.humming.first() {
            return IdentifyOutcome::Recognized(hit.to_candidate(played_offset_ms));
        }
    }

    IdentifyOutcome::Unrecognized(response.status)
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the identify endpoint
pub struct FingerprintClient {
    http_client: reqwest::Client,
    identify_url: String,
    credentials: Option<FingerprintCredentials>,
}

impl FingerprintClient {
    pub fn new(
        config: &FingerprintConfig,
        credentials: Option<FingerprintCredentials>,
    ) -> Result<Self, FingerprintError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FingerprintError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            identify_url: format!("{}{}", config.base_url.trim_end_matches('/'), IDENTIFY_URI),
            credentials,
        })
    }

    fn build_form(
        credentials: &FingerprintCredentials,
        sample: &AudioSample,
        timestamp: &str,
    ) -> Result<Form, FingerprintError> {
        let signature = sign(
            HTTP_METHOD,
            IDENTIFY_URI,
            &credentials.access_key,
            DATA_TYPE,
            SIGNATURE_VERSION,
            timestamp,
            &credentials.access_secret,
        )?;

        let sample_part = Part::bytes(sample.bytes.clone())
            .file_name(sample.file_name())
            .mime_str(sample.mime_type())
            .map_err(|e| FingerprintError::Request(e.to_string()))?;

        Ok(Form::new()
            .text("access_key", credentials.access_key.clone())
            .text("sample_bytes", sample.len().to_string())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature)
            .text("data_type", DATA_TYPE)
            .text("signature_version", SIGNATURE_VERSION)
            .part("sample", sample_part))
    }
}

fn transport_error(e: reqwest::Error) -> FingerprintError {
    if e.is_timeout() {
        FingerprintError::Timeout
    } else if e.is_connect() {
        FingerprintError::Network("connection failed".to_string())
    } else {
        FingerprintError::Network("request failed".to_string())
    }
}

#[async_trait]
impl FingerprintService for FingerprintClient {
    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn identify(
        &self,
        sample: &AudioSample,
        scope: LookupScope,
    ) -> Result<IdentifyOutcome, FingerprintError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(FingerprintError::NotConfigured)?;

        // Fresh per request: stale timestamps are rejected by the service
        let timestamp = spynners_common::time::unix_timestamp().to_string();
        let form = Self::build_form(credentials, sample, &timestamp)?;

        tracing::debug!(
            sample_bytes = sample.len(),
            format = ?sample.format,
            "Submitting sample to fingerprint service"
        );

        let response = self
            .http_client
            .post(&self.identify_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Fingerprint service request failed");
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Fingerprint service returned error status");
            return Err(FingerprintError::Http(status.as_u16()));
        }

        let body: IdentifyResponse = response
            .json()
            .await
            .map_err(|e| FingerprintError::Parse(e.to_string()))?;

        let outcome = interpret_response(body, scope);
        match &outcome {
            IdentifyOutcome::Recognized(candidate) => tracing::info!(
                title = %candidate.title,
                artist = %candidate.artist,
                score = candidate.confidence_score,
                direct = candidate.is_direct_catalog_match(),
                "Fingerprint service recognized sample"
            ),
            IdentifyOutcome::Unrecognized(status) => tracing::info!(
                code = status.code,
                msg = %status.msg,
                "Fingerprint service did not recognize sample"
            ),
        }
        Ok(outcome)
    }
}
