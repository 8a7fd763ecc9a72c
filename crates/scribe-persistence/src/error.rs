//! Error types for state files.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing state files.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Reading a state file failed.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a state file failed.
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A state file held invalid JSON or could not be encoded.
    #[error("invalid state JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The parent directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
