//! Error types for batch execution

use mlbatch_storage::StorageError;
use thiserror::Error;

/// Batch execution errors
///
/// Job failures are not errors: a job that runs and fails carries a non-zero
/// return code in its result. These variants are infrastructure failures
/// that abort the whole dispatch.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Batch halted via key '{0}'")]
    Halted(String),

    #[error("Store consistency error: {0}")]
    StoreConsistency(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cluster worker {worker} exited with code {code}")]
    ClusterWorkerFailure { worker: usize, code: i32 },

    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl ExecutionError {
    /// Whether this error was caused by a halt request
    pub fn is_halted(&self) -> bool {
        matches!(self, ExecutionError::Halted(_))
    }
}

// Convert from storage errors
impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Consistency { .. } => Self::StoreConsistency(err.to_string()),
            StorageError::Unavailable { .. } => Self::StoreUnavailable(err.to_string()),
            StorageError::ArtifactUnavailable(location) => Self::ArtifactUnavailable(location),
            StorageError::IoError(message) => Self::Io(message),
            StorageError::SerializationError(message) => Self::Serialization(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

// Convert from config errors
impl From<mlbatch_config::ConfigError> for ExecutionError {
    fn from(err: mlbatch_config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let err: ExecutionError = StorageError::Consistency {
            key: "results".to_string(),
            subkey: "1".to_string(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, ExecutionError::StoreConsistency(_)));

        let err: ExecutionError = StorageError::Unavailable {
            key: "results".to_string(),
            subkey: "1".to_string(),
            attempts: 3,
        }
        .into();
        assert!(matches!(err, ExecutionError::StoreUnavailable(_)));

        let err: ExecutionError = StorageError::ArtifactUnavailable("/x".to_string()).into();
        assert!(matches!(err, ExecutionError::ArtifactUnavailable(ref p) if p == "/x"));

        let err: ExecutionError = StorageError::InvalidKey("a/b".to_string()).into();
        assert!(matches!(err, ExecutionError::Storage(_)));
    }

    #[test]
    fn test_worker_failure_message() {
        let err = ExecutionError::ClusterWorkerFailure { worker: 2, code: 137 };
        assert_eq!(err.to_string(), "Cluster worker 2 exited with code 137");
        assert!(!err.is_halted());
        assert!(ExecutionError::Halted("stop".to_string()).is_halted());
    }
}
