//! Error types for the Folio engine.

use crate::{CollectionKind, LocalId, SchemaVersion};
use thiserror::Error;

/// All possible errors from the local store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: CollectionKind,
        id: LocalId,
    },

    // Validation errors
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    // Import errors
    #[error("incompatible export version: expected {expected}, got {actual}")]
    IncompatibleVersion {
        expected: SchemaVersion,
        actual: SchemaVersion,
    },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Storage errors
    #[error("storage quota exceeded: {required} bytes needed, limit is {limit}")]
    QuotaExceeded { limit: usize, required: usize },

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    pub(crate) fn not_found(collection: CollectionKind, id: LocalId) -> Self {
        Self::NotFound { collection, id }
    }

    /// True for errors caused by the caller's input rather than the store.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::InvalidReference(_) | Error::IncompatibleVersion { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
