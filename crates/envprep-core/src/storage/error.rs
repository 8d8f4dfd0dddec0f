//! # Envprep Core Storage Errors
//!
//! Defines [`StorageSystemError`], covering failures while reading, parsing
//! or persisting the per-project local state file.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse local state file '{path}': {source}")]
    DeserializationError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize local state for '{path}': {source}")]
    SerializationError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Storage operation '{operation}' failed for path '{path}': {message}")]
    OperationFailed {
        operation: String,
        path: PathBuf,
        message: String,
    },
}

// Helper for creating Io errors, ensuring path is always included.
impl StorageSystemError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}
