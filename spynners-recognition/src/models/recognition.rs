//! Recognition pipeline value objects
//!
//! External services answer with loosely shaped JSON. These types are built
//! once at the client boundary so the pipeline only ever sees explicit,
//! optional fields with documented defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `status` object of a fingerprint service response
///
/// A missing status is read as a failure (`code = -1`); only `code == 0` means success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default = "missing_status_code")]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

fn missing_status_code() -> i64 {
    -1
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            code: missing_status_code(),
            msg: String::new(),
        }
    }
}

impl ServiceStatus {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Catalog linkage embedded in a fingerprint hit against a catalog-registered reference file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectCatalogFields {
    pub catalog_track_id: Option<String>,
    pub producer_id: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub bpm: Option<f64>,
}

/// Normalized result of a successful identify call
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintCandidate {
    /// Fingerprint service's own id for the matched reference
    pub fingerprint_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// First genre, if any
    pub genre: Option<String>,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
    pub label: Option<String>,
    pub duration_ms: u64,
    pub confidence_score: f64,
    pub play_offset_ms: Option<u64>,
    pub external_ids: Option<Value>,
    /// Present only for direct (custom reference) matches
    pub direct_catalog_fields: Option<DirectCatalogFields>,
}

impl FingerprintCandidate {
    /// A direct match already names its catalog item; fuzzy matching is skipped.
    pub fn is_direct_catalog_match(&self) -> bool {
        self.direct_catalog_fields.is_some()
    }
}

/// Track record owned by the external catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "id", default, deserialize_with = "lenient_string")]
    pub catalog_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub producer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub producer_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub artwork_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bpm: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub label: Option<String>,
    #[serde(default, alias = "isrc_code", deserialize_with = "lenient_opt_string")]
    pub isrc: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub fingerprint_id: Option<String>,
}

impl CatalogEntry {
    /// Whether the entry still lacks a cached fingerprint id
    pub fn missing_fingerprint_id(&self) -> bool {
        self.fingerprint_id
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
    }
}

/// Accept strings and numbers; anything else reads as absent
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// [`lenient_opt_string`] with absence read as an empty string
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Accept numbers, numeric strings and null
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// How a catalog entry was linked to the fingerprint candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Fingerprint hit against a catalog-registered reference file
    Direct,
    /// Catalog entry already cached the fingerprint id
    FingerprintId,
    /// Text similarity over catalog titles and producers
    Fuzzy,
}

/// Catalog entry selected by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub entry: CatalogEntry,
    pub source: MatchSource,
    /// Composite fuzzy score (fuzzy matches only)
    pub score: Option<f64>,
}

/// Unified recognition result returned to callers and stored in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_offset_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_id: Option<String>,
    /// Whether catalog enrichment succeeded
    pub is_spynners_track: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_source: Option<MatchSource>,
    /// Linked catalog entry id
    #[serde(default, alias = "spynners_track_id", skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
}

impl MatchResult {
    /// Fingerprint-only result, no catalog enrichment
    pub fn from_candidate(candidate: &FingerprintCandidate) -> Self {
        Self {
            title: candidate.title.clone(),
            artist: candidate.artist.clone(),
            album: candidate.album.clone(),
            genre: candidate.genre.clone(),
            genres: candidate.genres.clone(),
            release_date: candidate.release_date.clone(),
            label: candidate.label.clone(),
            duration_ms: candidate.duration_ms,
            score: candidate.confidence_score,
            play_offset_ms: candidate.play_offset_ms,
            external_ids: candidate.external_ids.clone(),
            fingerprint_id: candidate.fingerprint_id.clone(),
            is_spynners_track: false,
            match_source: None,
            catalog_id: None,
            producer_id: None,
            producer_email: None,
            cover_image: None,
            isrc: None,
            bpm: None,
        }
    }

    /// Apply catalog linkage carried inline by a direct match, verbatim
    pub fn with_direct_fields(mut self, fields: &DirectCatalogFields) -> Self {
        self.is_spynners_track = true;
        self.match_source = Some(MatchSource::Direct);
        self.catalog_id = fields.catalog_track_id.clone();
        self.producer_id = fields.producer_id.clone();
        self.cover_image = fields.artwork_url.clone();
        self.isrc = fields.isrc.clone();
        self.bpm = fields.bpm;
        self
    }

    /// Apply catalog metadata from a matched entry
    ///
    /// Fingerprint values win; the entry only fills gaps.
    pub fn with_catalog_match(mut self, matched: &CatalogMatch) -> Self {
        let entry = &matched.entry;
        self.is_spynners_track = true;
        self.match_source = Some(matched.source);
        self.catalog_id = Some(entry.catalog_id.clone());
        self.producer_id = entry.producer_id.clone();
        self.cover_image = entry.artwork_url.clone();
        self.isrc = entry.isrc.clone();
        self.bpm = entry.bpm;
        if self.genre.is_none() {
            self.genre = entry.genre.clone();
        }
        if self.label.is_none() {
            self.label = entry.label.clone();
        }
        if self.release_date.is_none() {
            self.release_date = entry.release_date.clone();
        }
        self
    }
}

/// Append-only history entry keyed by the recognizing user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionHistoryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub result: MatchResult,
    pub timestamp: DateTime<Utc>,
}

impl RecognitionHistoryRecord {
    pub fn new(user_id: impl Into<String>, result: MatchResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            result,
            timestamp: spynners_common::time::now(),
        }
    }
}

/// One recording submitted in an offline session batch
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineRecording {
    pub audio_base64: String,
    /// Client-side capture time, echoed back untouched
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Outcome of one recording in an offline batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    /// Client-supplied recording timestamp, echoed back untouched
    pub timestamp: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchItemResult {
    pub fn recognized(index: usize, timestamp: Option<Value>, result: MatchResult) -> Self {
        Self {
            index,
            timestamp,
            success: true,
            result: Some(result),
            message: None,
        }
    }

    pub fn failed(index: usize, timestamp: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            index,
            timestamp,
            success: false,
            result: None,
            message: Some(message.into()),
        }
    }

    /// Recognized and linked to a catalog entry
    pub fn is_catalog_linked(&self) -> bool {
        self.result.as_ref().map_or(false, |r| r.is_spynners_track)
    }
}

/// Aggregated offline batch output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub recognized_count: usize,
    pub identified_count: usize,
    pub results: Vec<BatchItemResult>,
}

impl BatchSummary {
    pub fn from_results(results: Vec<BatchItemResult>) -> Self {
        Self {
            total: results.len(),
            recognized_count: results.iter().filter(|r| r.success).count(),
            identified_count: results.iter().filter(|r| r.is_catalog_linked()).count(),
            results,
        }
    }
}
