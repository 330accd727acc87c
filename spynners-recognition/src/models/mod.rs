//! Data models for the recognition pipeline

pub mod audio;
pub mod recognition;

pub use audio::{decode_base64_audio, AudioDecodeError, AudioFormat, AudioSample, DetectedFormat};
pub use recognition::{
    BatchItemResult, BatchSummary, CatalogEntry, CatalogMatch, DirectCatalogFields,
    FingerprintCandidate, MatchResult, MatchSource, OfflineRecording, RecognitionHistoryRecord,
    ServiceStatus,
};
