//! Client configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;
const DEFAULT_UNLOAD_TIMEOUT_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a [`Portfolio`](crate::Portfolio).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// File holding the local store
    pub data_path: PathBuf,
    /// Base URL of the mirror service; `None` keeps everything local
    pub remote_url: Option<String>,
    /// How long the connectivity probe may take before sync stays off
    pub probe_timeout: Duration,
    /// How long shutdown waits for in-flight mirror tasks
    pub unload_timeout: Duration,
    /// Timeout for a single remote request
    pub request_timeout: Duration,
    /// Local storage quota in bytes
    pub quota_bytes: Option<usize>,
}

impl SyncConfig {
    /// A configuration with no remote.
    pub fn local_only(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            remote_url: None,
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            unload_timeout: Duration::from_millis(DEFAULT_UNLOAD_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            quota_bytes: None,
        }
    }

    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout = timeout;
        self
    }

    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_path = env::var("FOLIO_DATA_PATH").map_err(|_| ConfigError::MissingDataPath)?;

        let remote_url = env::var("FOLIO_REMOTE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let probe_timeout = millis_var("FOLIO_PROBE_TIMEOUT_MS", DEFAULT_PROBE_TIMEOUT_MS)?;
        let unload_timeout = millis_var("FOLIO_UNLOAD_TIMEOUT_MS", DEFAULT_UNLOAD_TIMEOUT_MS)?;
        let request_timeout = millis_var("FOLIO_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;

        let quota_bytes = match env::var("FOLIO_QUOTA_BYTES") {
            Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                name: "FOLIO_QUOTA_BYTES",
                value,
            })?),
            Err(_) => None,
        };

        Ok(Self {
            data_path: data_path.into(),
            remote_url,
            probe_timeout,
            unload_timeout,
            request_timeout,
            quota_bytes,
        })
    }
}

fn millis_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FOLIO_DATA_PATH environment variable is required")]
    MissingDataPath,

    #[error("Invalid {name} value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_only_defaults() {
        let config = SyncConfig::local_only("/tmp/folio.redb");
        assert!(config.remote_url.is_none());
        assert_eq!(config.probe_timeout, Duration::from_secs(3));
        assert_eq!(config.unload_timeout, Duration::from_secs(2));
        assert!(config.quota_bytes.is_none());
    }

    #[test]
    fn builder() {
        let config = SyncConfig::local_only("data.redb")
            .with_remote("http://localhost:3000")
            .with_probe_timeout(Duration::from_millis(10))
            .with_quota(1024);
        assert_eq!(config.remote_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.probe_timeout, Duration::from_millis(10));
        assert_eq!(config.quota_bytes, Some(1024));
    }

    #[test]
    fn invalid_value_message() {
        let err = ConfigError::Invalid {
            name: "FOLIO_PROBE_TIMEOUT_MS",
            value: "soon".into(),
        };
        assert_eq!(err.to_string(), "Invalid FOLIO_PROBE_TIMEOUT_MS value: soon");
    }
}
