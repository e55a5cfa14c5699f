//! Configuration management for the mirror.

use std::env;

/// Default upper bound for a single uploaded blob (25 MiB).
pub const DEFAULT_MAX_BLOB_BYTES: usize = 25 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Base URL clients reach this server at; prefixes every `downloadURL`
    pub public_url: String,
    /// Largest accepted blob upload
    pub max_blob_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let max_blob_bytes = match env::var("MAX_BLOB_BYTES") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidMaxBlobBytes)?,
            Err(_) => DEFAULT_MAX_BLOB_BYTES,
        };

        Ok(Self {
            host,
            port,
            database_url,
            public_url,
            max_blob_bytes,
        })
    }

    /// Public URL a stored blob is downloaded from.
    pub fn download_url(&self, path: &str) -> String {
        format!("{}/v1/blobs/{}", self.public_url, path.trim_start_matches('/'))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid MAX_BLOB_BYTES value")]
    InvalidMaxBlobBytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_url_joins_path() {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 3000,
            database_url: "postgres://localhost/folio".into(),
            public_url: "https://mirror.example.com".into(),
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        };
        assert_eq!(
            config.download_url("/photos/1/2"),
            "https://mirror.example.com/v1/blobs/photos/1/2"
        );
    }
}
