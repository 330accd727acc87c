//! Configuration for the recognition service
//!
//! Bootstrap values come from `recognition.toml` (see
//! [`spynners_common::config`]); environment variables override individual
//! values. The resolved struct is handed to each component's constructor in
//! `main`, nothing reads configuration globally.

use serde::Deserialize;
use spynners_common::config::{env_value, is_valid_value, LoggingConfig};
use std::path::PathBuf;
use tracing::{info, warn};

/// Config file name looked up in the spynners config directories
pub const CONFIG_FILE_NAME: &str = "recognition.toml";

pub const ENV_FINGERPRINT_BASE_URL: &str = "SPYNNERS_FINGERPRINT_BASE_URL";
pub const ENV_FINGERPRINT_ACCESS_KEY: &str = "SPYNNERS_FINGERPRINT_ACCESS_KEY";
pub const ENV_FINGERPRINT_ACCESS_SECRET: &str = "SPYNNERS_FINGERPRINT_ACCESS_SECRET";
pub const ENV_CATALOG_BASE_URL: &str = "SPYNNERS_CATALOG_BASE_URL";
pub const ENV_CATALOG_API_KEY: &str = "SPYNNERS_CATALOG_API_KEY";
pub const ENV_FFMPEG_PATH: &str = "SPYNNERS_FFMPEG_PATH";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub fingerprint: FingerprintConfig,
    pub catalog: CatalogConfig,
    pub transcoder: TranscoderConfig,
    pub matching: MatchingConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Largest accepted request body (base64 audio payloads are large)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8001,
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("spynners_recognition.db"),
        }
    }
}

/// Fingerprint service connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub base_url: String,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,
    pub timeout_secs: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            base_url: "https://identify-eu-west-1.acrcloud.com".to_string(),
            access_key: None,
            access_secret: None,
            timeout_secs: 30,
        }
    }
}

/// Access key + secret pair used to sign identify requests
#[derive(Clone, PartialEq, Eq)]
pub struct FingerprintCredentials {
    pub access_key: String,
    pub access_secret: String,
}

impl std::fmt::Debug for FingerprintCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCredentials")
            .field("access_key", &self.access_key)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// Catalog platform connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Application API root, e.g. `https://app.base44.com/api/apps/<app-id>`
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002/api".to_string(),
            api_key: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub tool_path: PathBuf,
    /// Parent directory for per-call scratch directories (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
    pub sample_rate: u32,
    pub identify_timeout_secs: u64,
    pub convert_timeout_secs: u64,
    pub concat_timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from("ffmpeg"),
            work_dir: None,
            sample_rate: 44_100,
            identify_timeout_secs: 30,
            convert_timeout_secs: 120,
            concat_timeout_secs: 300,
        }
    }
}

/// Fuzzy catalog matching calibration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub accept_threshold: f64,
    /// Catalog entries scored per fuzzy pass, capped at 500
    pub candidate_limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            accept_threshold: crate::services::catalog_matcher::MATCH_ACCEPT_THRESHOLD,
            candidate_limit: crate::services::catalog_matcher::FUZZY_CANDIDATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Recordings processed concurrently in an offline batch (1 = sequential)
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl RecognitionConfig {
    /// Apply environment overrides for URLs, catalog key and tool path
    ///
    /// Fingerprint credentials are resolved separately by
    /// [`RecognitionConfig::resolve_fingerprint_credentials`].
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value(ENV_FINGERPRINT_BASE_URL) {
            self.fingerprint.base_url = url;
        }
        if let Some(url) = env_value(ENV_CATALOG_BASE_URL) {
            self.catalog.base_url = url;
        }
        if let Some(key) = env_value(ENV_CATALOG_API_KEY) {
            self.catalog.api_key = Some(key);
        }
        if let Some(path) = env_value(ENV_FFMPEG_PATH) {
            self.transcoder.tool_path = PathBuf::from(path);
        }
    }

    /// Resolve fingerprint credentials
    ///
    /// **Priority:** ENV → TOML. Key and secret are taken as a pair from the
    /// same source. Returns `None` when neither source is complete; the
    /// service still starts, but recognition answers 503.
    pub fn resolve_fingerprint_credentials(&self) -> Option<FingerprintCredentials> {
        let env_pair = match (
            env_value(ENV_FINGERPRINT_ACCESS_KEY),
            env_value(ENV_FINGERPRINT_ACCESS_SECRET),
        ) {
            (Some(access_key), Some(access_secret)) => Some(FingerprintCredentials {
                access_key,
                access_secret,
            }),
            _ => None,
        };

        let toml_pair = match (&self.fingerprint.access_key, &self.fingerprint.access_secret) {
            (Some(key), Some(secret)) if is_valid_value(key) && is_valid_value(secret) => {
                Some(FingerprintCredentials {
                    access_key: key.clone(),
                    access_secret: secret.clone(),
                })
            }
            _ => None,
        };

        if env_pair.is_some() && toml_pair.is_some() {
            warn!("Fingerprint credentials found in environment and TOML. Using environment (highest priority).");
        }

        if env_pair.is_some() {
            info!("Fingerprint credentials loaded from environment variables");
            return env_pair;
        }
        if toml_pair.is_some() {
            info!("Fingerprint credentials loaded from TOML config");
            return toml_pair;
        }

        warn!(
            "Fingerprint credentials not configured. Set {} and {} or the [fingerprint] section of {}",
            ENV_FINGERPRINT_ACCESS_KEY, ENV_FINGERPRINT_ACCESS_SECRET, CONFIG_FILE_NAME
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecognitionConfig::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.fingerprint.timeout_secs, 30);
        assert_eq!(config.transcoder.identify_timeout_secs, 30);
        assert_eq!(config.transcoder.convert_timeout_secs, 120);
        assert_eq!(config.transcoder.concat_timeout_secs, 300);
        assert_eq!(config.matching.accept_threshold, 0.45);
        assert_eq!(config.matching.candidate_limit, 500);
        assert_eq!(config.batch.concurrency, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RecognitionConfig = spynners_common::config::parse_toml_config(
            "[server]\nport = 9000\n\n[matching]\naccept_threshold = 0.5\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.matching.accept_threshold, 0.5);
        assert_eq!(config.matching.candidate_limit, 500);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = FingerprintCredentials {
            access_key: "key".to_string(),
            access_secret: "super-secret".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("super-secret"));
    }
}
