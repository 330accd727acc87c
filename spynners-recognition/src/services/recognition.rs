//! Recognition orchestration
//!
//! One call runs strictly in order:
//! detect format → transcode (if needed) → identify → direct match or catalog
//! matcher → producer email → history write → result.
//!
//! Identify is the only mandatory external step. Catalog matching, producer
//! lookup and history persistence are best-effort and degrade to a
//! fingerprint-only result.

use crate::config::BatchConfig;
use crate::db::HistorySink;
use crate::models::{
    decode_base64_audio, AudioDecodeError, AudioSample, BatchItemResult, BatchSummary,
    FingerprintCandidate, MatchResult, OfflineRecording, RecognitionHistoryRecord, ServiceStatus,
};
use crate::services::audio_format;
use crate::services::catalog_client::CatalogService;
use crate::services::catalog_matcher::TrackMatcher;
use crate::services::fingerprint_client::{
    FingerprintError, FingerprintService, IdentifyOutcome, LookupScope,
};
use crate::services::transcoder::AudioTranscoder;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extension assumed for unrecognized input on the identify path
pub const IDENTIFY_DEFAULT_EXTENSION: &str = "m4a";
pub const NOT_RECOGNIZED_MESSAGE: &str = "Could not identify the track";

/// Failures that abort a recognition call
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Fingerprint service not configured")]
    NotConfigured,

    #[error(transparent)]
    Identify(#[from] FingerprintError),
}

/// Result of a completed recognition call
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Recognized(MatchResult),
    /// Clean non-match; carries the service status for the caller
    Unrecognized(ServiceStatus),
}

/// Top-level "identify and enrich" operation
pub struct RecognitionOrchestrator {
    transcoder: Arc<AudioTranscoder>,
    fingerprint: Arc<dyn FingerprintService>,
    matcher: Arc<dyn TrackMatcher>,
    catalog: Arc<dyn CatalogService>,
    history: Arc<dyn HistorySink>,
    batch_concurrency: usize,
}

impl RecognitionOrchestrator {
    pub fn new(
        transcoder: Arc<AudioTranscoder>,
        fingerprint: Arc<dyn FingerprintService>,
        matcher: Arc<dyn TrackMatcher>,
        catalog: Arc<dyn CatalogService>,
        history: Arc<dyn HistorySink>,
        batch: &BatchConfig,
    ) -> Self {
        Self {
            transcoder,
            fingerprint,
            matcher,
            catalog,
            history,
            batch_concurrency: batch.concurrency.max(1),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.fingerprint.is_configured()
    }

    /// Identify one sample and enrich it from the catalog
    ///
    /// `user_id` keys the history record; without it nothing is persisted.
    pub async fn recognize(
        &self,
        bytes: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        if !self.is_configured() {
            return Err(RecognitionError::NotConfigured);
        }
        self.run(bytes, user_id, LookupScope::Standard).await
    }

    /// Process an offline session batch
    ///
    /// Items are isolated: one failing recording becomes a failed item and the
    /// rest still run. Output order equals input order.
    pub async fn process_batch(
        &self,
        recordings: Vec<OfflineRecording>,
        user_id: Option<&str>,
    ) -> Result<BatchSummary, RecognitionError> {
        if !self.is_configured() {
            return Err(RecognitionError::NotConfigured);
        }

        info!(
            recordings = recordings.len(),
            concurrency = self.batch_concurrency,
            "Processing offline session batch"
        );

        let results: Vec<BatchItemResult> = stream::iter(recordings.into_iter().enumerate())
            .map(|(index, recording)| self.process_recording(index, recording, user_id))
            .buffered(self.batch_concurrency)
            .collect()
            .await;

        let summary = BatchSummary::from_results(results);
        info!(
            total = summary.total,
            recognized = summary.recognized_count,
            identified = summary.identified_count,
            "Offline session batch complete"
        );
        Ok(summary)
    }

    async fn process_recording(
        &self,
        index: usize,
        recording: OfflineRecording,
        user_id: Option<&str>,
    ) -> BatchItemResult {
        let OfflineRecording {
            audio_base64,
            timestamp,
        } = recording;

        let bytes = match decode_base64_audio(&audio_base64) {
            Ok(bytes) => bytes,
            Err(AudioDecodeError::Empty) => {
                return BatchItemResult::failed(index, timestamp, "Empty audio data")
            }
            Err(_) => return BatchItemResult::failed(index, timestamp, "Invalid audio data"),
        };

        match self.run(bytes, user_id, LookupScope::IncludeHumming).await {
            Ok(RecognitionOutcome::Recognized(result)) => {
                BatchItemResult::recognized(index, timestamp, result)
            }
            Ok(RecognitionOutcome::Unrecognized(_)) => {
                BatchItemResult::failed(index, timestamp, NOT_RECOGNIZED_MESSAGE)
            }
            Err(e) => {
                warn!(index, error = %e, "Offline recording failed");
                BatchItemResult::failed(index, timestamp, format!("Recognition failed: {}", e))
            }
        }
    }

    async fn run(
        &self,
        bytes: Vec<u8>,
        user_id: Option<&str>,
        scope: LookupScope,
    ) -> Result<RecognitionOutcome, RecognitionError> {
        let detected = audio_format::detect(&bytes, IDENTIFY_DEFAULT_EXTENSION);
        debug!(
            format = ?detected.format,
            bytes = bytes.len(),
            needs_transcoding = detected.needs_transcoding,
            "Audio format detected"
        );

        let sample = self
            .transcoder
            .normalize_for_identify(AudioSample::new(bytes, detected))
            .await;

        let candidate = match self.fingerprint.identify(&sample, scope).await? {
            IdentifyOutcome::Recognized(candidate) => candidate,
            IdentifyOutcome::Unrecognized(status) => {
                return Ok(RecognitionOutcome::Unrecognized(status));
            }
        };
        drop(sample);

        let result = self.enrich(&candidate).await;

        if let Some(user_id) = user_id {
            self.persist(user_id, &result).await;
        }

        Ok(RecognitionOutcome::Recognized(result))
    }

    async fn enrich(&self, candidate: &FingerprintCandidate) -> MatchResult {
        let base = MatchResult::from_candidate(candidate);

        let mut result = match &candidate.direct_catalog_fields {
            Some(fields) => {
                debug!(title = %candidate.title, "Direct catalog match, skipping matcher");
                base.with_direct_fields(fields)
            }
            None => match self
                .matcher
                .find_match(
                    &candidate.title,
                    &candidate.artist,
                    candidate.fingerprint_id.as_deref(),
                )
                .await
            {
                Ok(Some(matched)) => base.with_catalog_match(&matched),
                Ok(None) => base,
                Err(e) => {
                    warn!(error = %e, "Catalog matching failed, returning fingerprint-only result");
                    base
                }
            },
        };

        if let Some(producer_id) = result.producer_id.clone() {
            match self.catalog.producer_email(&producer_id).await {
                Ok(email) => result.producer_email = email,
                Err(e) => warn!(producer_id = %producer_id, error = %e, "Producer lookup failed"),
            }
        }

        result
    }

    async fn persist(&self, user_id: &str, result: &MatchResult) {
        let record = RecognitionHistoryRecord::new(user_id, result.clone());
        if let Err(e) = self.history.record(&record).await {
            warn!(error = %e, "Failed to store recognition history");
        }
    }
}
