//! Error types for the X API client.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by the social API.
#[derive(Debug, Error)]
pub enum SocialError {
    /// Too many requests. `reset_at` is when the window reopens, if reported.
    #[error("rate limited (reset at {reset_at:?})")]
    RateLimited {
        /// Reset time from the `x-rate-limit-reset` header.
        reset_at: Option<DateTime<Utc>>,
    },

    /// The request was understood but refused.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The post does not exist or is not visible.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request did not complete.
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response.
        message: String,
    },

    /// The response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SocialError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SocialError::Parse(e.to_string())
        } else {
            SocialError::Network(e.to_string())
        }
    }
}

/// Result type alias for social API calls.
pub type Result<T> = std::result::Result<T, SocialError>;
