//! Audio format detection from magic numbers
//!
//! Detection is advisory: it never fails, and unrecognized bytes are passed
//! downstream untouched for the fingerprint service to accept or reject.

use crate::models::{AudioFormat, DetectedFormat};

const RIFF_MAGIC: &[u8] = b"RIFF";
const EBML_MAGIC: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
const FTYP_MARKER: &[u8] = b"ftyp";
const ID3_MAGIC: &[u8] = b"ID3";
const MPEG_FRAME_SYNC: &[u8] = &[0xFF, 0xFB];
const OGG_MAGIC: &[u8] = b"OggS";

/// Classify a buffer by its leading bytes
///
/// Checked in priority order: RIFF, EBML, `ftyp` at offset 0 or 4, ID3 /
/// MPEG frame sync, OggS.
pub fn detect_format(bytes: &[u8]) -> AudioFormat {
    if bytes.starts_with(RIFF_MAGIC) {
        AudioFormat::Wav
    } else if bytes.starts_with(EBML_MAGIC) {
        AudioFormat::Webm
    } else if bytes.starts_with(FTYP_MARKER) || bytes.get(4..8) == Some(FTYP_MARKER) {
        AudioFormat::M4a
    } else if bytes.starts_with(ID3_MAGIC) || bytes.starts_with(MPEG_FRAME_SYNC) {
        AudioFormat::Mp3
    } else if bytes.starts_with(OGG_MAGIC) {
        AudioFormat::Ogg
    } else {
        AudioFormat::Unknown
    }
}

/// Detect the format, naming unknown input with the call site's default extension
pub fn detect(bytes: &[u8], default_extension: &'static str) -> DetectedFormat {
    let format = detect_format(bytes);
    DetectedFormat {
        format,
        extension: format.extension().unwrap_or(default_extension),
        needs_transcoding: format.needs_transcoding(),
    }
}
