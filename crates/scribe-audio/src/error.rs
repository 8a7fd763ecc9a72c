//! Error types for audio downloads.

use std::time::Duration;
use thiserror::Error;

/// Reasons a Space recording could not be fetched.
///
/// None of these are fatal to the bot: the mention is marked processed
/// and answered with a neutral reply.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The Space was deleted, is private, or was never recorded.
    #[error("space not found: {0}")]
    NotFound(String),

    /// The download did not finish in time and was killed.
    #[error("download timed out after {0:?}")]
    Timeout(Duration),

    /// The tool is missing, exited with an error, or produced no file.
    #[error("download tool failed: {0}")]
    ToolError(String),

    /// The URL does not point at a Space.
    #[error("invalid space url: {0}")]
    InvalidUrl(String),
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::ToolError(e.to_string())
    }
}

/// Result type alias for audio downloads.
pub type Result<T> = std::result::Result<T, FetchError>;
