//! Storage error types

use mlbatch_resilience::Retryable;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Key or subkey unusable by the backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A value just written could not be read back
    #[error("Read-back of {key}/{subkey} returned nothing")]
    ReadBackMissing { key: String, subkey: String },

    /// An expected result is not (yet) visible
    #[error("Result {key}/{subkey} not found")]
    ResultMissing { key: String, subkey: String },

    /// Write never became visible within the retry budget
    #[error("Store inconsistency: write of {key}/{subkey} not visible after {attempts} attempts")]
    Consistency {
        key: String,
        subkey: String,
        attempts: u32,
    },

    /// Expected result still absent after the retry budget
    #[error("Result {key}/{subkey} unavailable after {attempts} attempts")]
    Unavailable {
        key: String,
        subkey: String,
        attempts: u32,
    },

    /// A declared artifact could not be materialized locally
    #[error("Unable to realize file: {0}")]
    ArtifactUnavailable(String),
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::ReadBackMissing { .. } | StorageError::ResultMissing { .. }
        )
    }

    fn is_transient(&self) -> bool {
        matches!(self, StorageError::ReadBackMissing { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}
