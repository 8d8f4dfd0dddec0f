//! # Envprep Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type.
//!
//! Each subsystem keeps its own typed error enum; this module folds them
//! into one type so that `?` works across subsystem boundaries. Unmet
//! requirements are never reported through these errors: they are data in a
//! failed `PrepareResult`. What ends up here is caller misuse or a broken
//! environment (missing files, unregistered providers, cycles).
use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::plugin_system::error::PluginSystemError;
use crate::stage_manager::error::PrepareSystemError;
use crate::storage::error::StorageSystemError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Staged preparation error (stage misuse, cycles, bad options)
    #[error("Prepare system error: {0}")]
    PrepareSystem(#[from] PrepareSystemError),

    /// Provider registry or provider error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Local state storage error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wrap an I/O error with the operation and path it happened on
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }
}

/// Result type alias for envprep operations
pub type Result<T> = std::result::Result<T, Error>;
