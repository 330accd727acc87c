//! Audio sample types

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container/codec classification of a raw audio buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
    Webm,
    Ogg,
    Unknown,
}

impl AudioFormat {
    /// File extension used when the format must be named on disk or on the wire
    ///
    /// `Unknown` has no extension of its own; call sites pick their default.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => Some("wav"),
            AudioFormat::Mp3 => Some("mp3"),
            AudioFormat::M4a => Some("m4a"),
            AudioFormat::Webm => Some("webm"),
            AudioFormat::Ogg => Some("ogg"),
            AudioFormat::Unknown => None,
        }
    }

    /// Whether the fingerprint service needs this format converted to PCM/WAV first
    pub fn needs_transcoding(self) -> bool {
        matches!(self, AudioFormat::Webm | AudioFormat::M4a | AudioFormat::Ogg)
    }

    /// MIME type sent with the sample part of a multipart upload
    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/m4a",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }

    /// Map an extension back to a format (case-insensitive)
    pub fn from_extension(ext: &str) -> AudioFormat {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => AudioFormat::Wav,
            "mp3" => AudioFormat::Mp3,
            "m4a" | "mp4" | "aac" => AudioFormat::M4a,
            "webm" => AudioFormat::Webm,
            "ogg" | "oga" => AudioFormat::Ogg,
            _ => AudioFormat::Unknown,
        }
    }
}

/// Result of format detection at a particular call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    pub format: AudioFormat,
    /// Extension to use on disk; the call site default when the format is unknown
    pub extension: &'static str,
    pub needs_transcoding: bool,
}

/// Raw audio bytes plus their detected format
///
/// Created per request and dropped once the pipeline completes.
#[derive(Debug, Clone)]
pub struct AudioSample {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub extension: &'static str,
}

impl AudioSample {
    pub fn new(bytes: Vec<u8>, detected: DetectedFormat) -> Self {
        Self {
            bytes,
            format: detected.format,
            extension: detected.extension,
        }
    }

    /// File name announced to the fingerprint service
    pub fn file_name(&self) -> String {
        format!("sample.{}", self.extension)
    }

    /// MIME type announced to the fingerprint service
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            AudioFormat::Unknown => AudioFormat::from_extension(self.extension).mime_type(),
            known => known.mime_type(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Rejected base64 audio payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AudioDecodeError {
    #[error("Invalid audio data URI")]
    InvalidDataUri,

    #[error("Invalid base64 audio data")]
    InvalidBase64,

    #[error("Empty audio data")]
    Empty,
}

/// Decode a base64 audio payload
///
/// Surrounding whitespace and a `data:<mime>;base64,` prefix are tolerated.
pub fn decode_base64_audio(encoded: &str) -> Result<Vec<u8>, AudioDecodeError> {
    let encoded = encoded.trim();
    let payload = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or(AudioDecodeError::InvalidDataUri)?,
        None => encoded,
    };

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AudioDecodeError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(AudioDecodeError::Empty);
    }
    Ok(bytes)
}
