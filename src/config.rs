//! Configuration file
//!
//! Settings are read from a TOML file. Without an explicit path the file is
//! looked up in the system's standard configuration directory; a missing
//! file yields the defaults.
//!
//! ```toml
//! output_dir = "/srv/rtve"
//!
//! [http]
//! timeout_secs = 10
//! download_timeout_secs = 30
//! max_retries = 3
//! initial_backoff_ms = 1000
//! user_agent = "Mozilla/5.0 ..."
//! ```

use crate::client::ClientSettings;
use crate::http::{DEFAULT_USER_AGENT, RetryPolicy};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default archive root, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "rtve-videos";

/// Errors that can occur while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The configuration file is not valid TOML of the expected shape
    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Timeout for listing pages and JSON endpoints
    pub timeout_secs: u64,
    /// Timeout for subtitle downloads
    pub download_timeout_secs: u64,
    /// Retries after the first attempt for 5xx responses
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub initial_backoff_ms: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            download_timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the video archive
    pub output_dir: PathBuf,
    /// HTTP settings
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when it exists and the built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => {
                    tracing::debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Reads and parses a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "loaded config file");

        Self::parse(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parses configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Client settings derived from the `[http]` table
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            request_timeout: Duration::from_secs(self.http.timeout_secs),
            download_timeout: Duration::from_secs(self.http.download_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.http.max_retries,
                initial_backoff: Duration::from_millis(self.http.initial_backoff_ms),
            },
        }
    }
}

/// Default location of the configuration file, if the platform has one
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("es", "rtve-subs", "rtve-subs")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("rtve-videos"));

        let settings = config.client_settings();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn test_parse_partial() {
        let config = Config::parse(
            r#"
            output_dir = "/srv/rtve"

            [http]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/srv/rtve"));
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.http.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_client_settings() {
        let config = Config::parse(
            "[http]\ntimeout_secs = 5\ndownload_timeout_secs = 60\ninitial_backoff_ms = 250\n",
        )
        .unwrap();

        let settings = config.client_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.download_timeout, Duration::from_secs(60));
        assert_eq!(settings.retry.initial_backoff, Duration::from_millis(250));
        assert_eq!(settings.retry.max_retries, 3);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(Config::parse("output = \"x\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));

        fs::write(&path, "output_dir = 42").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));

        fs::write(&path, "output_dir = \"archive\"").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("archive"));
    }
}
