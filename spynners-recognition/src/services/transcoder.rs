//! Audio transcoding via an external media tool (ffmpeg)
//!
//! Every invocation works inside its own scratch directory. The directory is
//! owned by a [`tempfile::TempDir`], so it is removed on every exit path:
//! success, tool failure, timeout or early return.

use crate::config::TranscoderConfig;
use crate::models::AudioSample;
use crate::services::audio_format;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;

/// Output formats accepted by explicit conversion requests
pub const SUPPORTED_OUTPUT_FORMATS: &[&str] = &["wav", "mp3", "m4a", "aac", "ogg", "flac", "webm"];

/// Longest stderr excerpt kept for logging
const STDERR_EXCERPT_LEN: usize = 512;

/// Transcoding errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Tool ran and exited non-zero
    #[error("Transcoding tool exited with status {code:?}")]
    ToolFailed { code: Option<i32>, stderr: String },

    /// Tool exited cleanly but wrote no output file
    #[error("Transcoding tool produced no output")]
    MissingOutput,

    #[error("Transcoding timed out after {0:?}")]
    Timeout(Duration),

    /// Tool could not be launched at all
    #[error("Failed to launch transcoding tool: {0}")]
    Spawn(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio segments to concatenate")]
    NoSegments,
}

impl TranscodeError {
    /// Failures attributable to the tool run itself, reported as a structured
    /// `success: false` rather than an internal error
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            TranscodeError::ToolFailed { .. } | TranscodeError::MissingOutput | TranscodeError::Timeout(_)
        )
    }
}

/// Parameters for a single transcode run
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    pub target_ext: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub timeout: Duration,
}

/// External-tool transcoder
pub struct AudioTranscoder {
    tool_path: PathBuf,
    work_dir: Option<PathBuf>,
    sample_rate: u32,
    identify_timeout: Duration,
    convert_timeout: Duration,
    concat_timeout: Duration,
}

impl AudioTranscoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            tool_path: config.tool_path.clone(),
            work_dir: config.work_dir.clone(),
            sample_rate: config.sample_rate,
            identify_timeout: Duration::from_secs(config.identify_timeout_secs),
            convert_timeout: Duration::from_secs(config.convert_timeout_secs),
            concat_timeout: Duration::from_secs(config.concat_timeout_secs),
        }
    }

    /// Options used before submitting a sample for identification
    pub fn identify_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            target_ext: "wav".to_string(),
            sample_rate: Some(self.sample_rate),
            channels: Some(1),
            timeout: self.identify_timeout,
        }
    }

    /// Normalize a sample for the fingerprint service
    ///
    /// Formats the service handles natively pass through. When the tool fails
    /// the original bytes are submitted instead; transcoding only improves
    /// accuracy and is never a precondition.
    pub async fn normalize_for_identify(&self, sample: AudioSample) -> AudioSample {
        if !sample.format.needs_transcoding() {
            return sample;
        }

        let options = self.identify_options();
        match self.transcode(&sample.bytes, sample.extension, &options).await {
            Ok(wav) => {
                tracing::debug!(
                    from = sample.extension,
                    input_bytes = sample.len(),
                    output_bytes = wav.len(),
                    "Sample transcoded to WAV for identification"
                );
                let detected = audio_format::detect(&wav, "wav");
                AudioSample::new(wav, detected)
            }
            Err(e) => {
                tracing::warn!(
                    from = sample.extension,
                    error = %e,
                    "Transcoding failed, submitting original sample"
                );
                sample
            }
        }
    }

    /// Explicit user-requested conversion
    pub async fn convert(&self, bytes: &[u8], output_ext: &str) -> Result<Vec<u8>, TranscodeError> {
        let target_ext = validate_output_format(output_ext)?;
        let input = audio_format::detect(bytes, "wav");
        let options = TranscodeOptions {
            target_ext,
            sample_rate: Some(self.sample_rate),
            channels: None,
            timeout: self.convert_timeout,
        };
        self.transcode(bytes, input.extension, &options).await
    }

    /// Transcode one buffer into the requested target format
    pub async fn transcode(
        &self,
        bytes: &[u8],
        input_ext: &str,
        options: &TranscodeOptions,
    ) -> Result<Vec<u8>, TranscodeError> {
        let scratch = self.scratch_dir()?;
        let input_path = scratch.path().join(format!("input.{}", input_ext));
        let output_path = scratch.path().join(format!("output.{}", options.target_ext));

        tokio::fs::write(&input_path, bytes).await?;

        let mut args: Vec<String> = base_args();
        args.push("-i".to_string());
        args.push(path_arg(&input_path));
        if let Some(rate) = options.sample_rate {
            args.push("-ar".to_string());
            args.push(rate.to_string());
        }
        if let Some(channels) = options.channels {
            args.push("-ac".to_string());
            args.push(channels.to_string());
        }
        if options.target_ext == "wav" {
            args.push("-c:a".to_string());
            args.push("pcm_s16le".to_string());
        }
        args.push(path_arg(&output_path));

        self.run_tool(&args, options.timeout).await?;
        read_output(&output_path).await
    }

    /// Concatenate segments in input order by stream copy (no re-encoding)
    pub async fn concatenate(
        &self,
        segments: &[Vec<u8>],
        output_ext: &str,
    ) -> Result<Vec<u8>, TranscodeError> {
        if segments.is_empty() {
            return Err(TranscodeError::NoSegments);
        }
        let target_ext = validate_output_format(output_ext)?;

        let scratch = self.scratch_dir()?;
        let mut manifest = String::new();
        for (index, segment) in segments.iter().enumerate() {
            let ext = audio_format::detect(segment, "wav").extension;
            let path = scratch.path().join(format!("segment_{:04}.{}", index, ext));
            tokio::fs::write(&path, segment).await?;
            manifest.push_str(&manifest_line(&path));
        }

        let manifest_path = scratch.path().join("segments.txt");
        tokio::fs::write(&manifest_path, manifest).await?;
        let output_path = scratch.path().join(format!("output.{}", target_ext));

        let mut args = base_args();
        args.extend(
            ["-f", "concat", "-safe", "0", "-i"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(path_arg(&manifest_path));
        args.push("-c".to_string());
        args.push("copy".to_string());
        args.push(path_arg(&output_path));

        tracing::debug!(segments = segments.len(), format = %target_ext, "Concatenating audio segments");

        self.run_tool(&args, self.concat_timeout).await?;
        read_output(&output_path).await
    }

    fn scratch_dir(&self) -> Result<TempDir, TranscodeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("spynners-audio-");
        let dir = match &self.work_dir {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn run_tool(&self, args: &[String], timeout: Duration) -> Result<(), TranscodeError> {
        let mut command = Command::new(&self.tool_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Transcoding tool timed out");
                return Err(TranscodeError::Timeout(timeout));
            }
            Ok(result) => result.map_err(TranscodeError::Spawn)?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_LEN).collect();
            tracing::warn!(
                code = ?output.status.code(),
                stderr = %excerpt,
                "Transcoding tool failed"
            );
            return Err(TranscodeError::ToolFailed {
                code: output.status.code(),
                stderr: excerpt,
            });
        }

        Ok(())
    }
}

/// Lowercase and check an output format against [`SUPPORTED_OUTPUT_FORMATS`]
pub fn validate_output_format(ext: &str) -> Result<String, TranscodeError> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if SUPPORTED_OUTPUT_FORMATS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(TranscodeError::UnsupportedFormat(ext))
    }
}

fn base_args() -> Vec<String> {
    ["-hide_banner", "-loglevel", "error", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// One line of an ffmpeg concat manifest, single quotes escaped
fn manifest_line(path: &Path) -> String {
    format!("file '{}'\n", path_arg(path).replace('\'', "'\\''"))
}

async fn read_output(path: &Path) -> Result<Vec<u8>, TranscodeError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TranscodeError::MissingOutput),
        Err(e) => Err(TranscodeError::Io(e)),
    }
}
