//! Recognition pipeline services

pub mod audio_format;
pub mod catalog_client;
pub mod catalog_matcher;
pub mod fingerprint_client;
pub mod recognition;
pub mod transcoder;

pub use catalog_client::{CatalogClient, CatalogError, CatalogService};
pub use catalog_matcher::{CatalogMatcher, TrackMatcher};
pub use fingerprint_client::{FingerprintClient, FingerprintError, FingerprintService};
pub use recognition::{RecognitionError, RecognitionOrchestrator, RecognitionOutcome};
pub use transcoder::{AudioTranscoder, TranscodeError};
