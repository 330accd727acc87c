//! Bootstrap configuration loading
//!
//! Services read a small TOML file at startup. The file is located with this
//! priority order:
//! 1. Explicit path (command-line argument or `SPYNNERS_CONFIG`)
//! 2. User config directory (`~/.config/spynners/<file>`)
//! 3. System config directory (`/etc/spynners/<file>`)
//! 4. None: the service runs on built-in defaults
//!
//! Individual values may then be overridden by environment variables, see
//! [`env_value`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPYNNERS_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Filter directive covering the given crates at the configured level
    pub fn filter_directive(&self, crates: &[&str]) -> String {
        crates
            .iter()
            .map(|name| format!("{}={}", name, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Locate the bootstrap config file for a service
///
/// An explicit path must exist; the implicit locations are optional.
pub fn locate_config_file(explicit: Option<&Path>, file_name: &str) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("spynners").join(file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let system_config = PathBuf::from("/etc/spynners").join(file_name);
    if system_config.exists() {
        return Ok(Some(system_config));
    }

    Ok(None)
}

/// Parse TOML content into a config struct
pub fn parse_toml_config<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load a service's bootstrap config, falling back to defaults when no file exists
///
/// Returns the parsed config and the path it was read from (if any).
pub fn load_toml_config<T>(explicit: Option<&Path>, file_name: &str) -> Result<(T, Option<PathBuf>)>
where
    T: DeserializeOwned + Default,
{
    match locate_config_file(explicit, file_name)? {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
            let config = parse_toml_config(&content)?;
            info!("Configuration loaded from {}", path.display());
            Ok((config, Some(path)))
        }
        None => {
            debug!(file_name, "No config file found, using built-in defaults");
            Ok((T::default(), None))
        }
    }
}

/// Validate a configured value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Read an environment variable, ignoring unset and blank values
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_value(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct SampleConfig {
        #[serde(default)]
        logging: LoggingConfig,
        name: Option<String>,
    }

    #[test]
    fn test_is_valid_value() {
        assert!(is_valid_value("abc"));
        assert!(!is_valid_value(""));
        assert!(!is_valid_value("   \t"));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let result = locate_config_file(Some(Path::new("/nonexistent/spynners.toml")), "x.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, "name = \"demo\"\n[logging]\nlevel = \"debug\"\n").unwrap();

        let (config, source): (SampleConfig, _) =
            load_toml_config(Some(&path), "service.toml").unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_toml_config::<SampleConfig>("name = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_logging_defaults_to_info() {
        let config: SampleConfig = parse_toml_config("").unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_filter_directive() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
        };
        assert_eq!(
            logging.filter_directive(&["a", "b_c"]),
            "a=warn,b_c=warn"
        );
    }
}
