//! Remote failures.
//!
//! Every variant is a flavor of "the remote is unavailable". These errors
//! are logged and swallowed by the mirror client; they never reach callers
//! of the facade.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode remote document: {0}")]
    Decode(String),

    #[error("remote did not answer within {0:?}")]
    Timeout(Duration),

    #[error("change feed error: {0}")]
    Socket(String),
}

impl RemoteError {
    pub(crate) fn decode(err: impl ToString) -> Self {
        RemoteError::Decode(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status: 404, .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RemoteError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RemoteError::Socket(err.to_string())
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
