//! Error types for the Telegram relay.

use std::time::Duration;

use teloxide::{ApiError, RequestError};
use thiserror::Error;

/// Errors that can occur while relaying notifications.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Telegram asked us to wait before sending again.
    #[error("Rate limited, retry after {0:?}")]
    RetryAfter(Duration),

    /// The bot token was rejected.
    #[error("Telegram bot token rejected")]
    InvalidToken,

    /// The chat cannot receive messages (blocked the bot, deleted, unknown).
    #[error("Chat unavailable: {0}")]
    ChatUnavailable(String),

    /// Any other Telegram API error.
    #[error("Telegram API error: {0}")]
    Api(String),

    /// The request did not complete.
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;

impl From<RequestError> for TelegramError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::RetryAfter(secs) => TelegramError::RetryAfter(secs.duration()),
            RequestError::Api(ApiError::InvalidToken) => TelegramError::InvalidToken,
            RequestError::Api(
                api @ (ApiError::BotBlocked
                | ApiError::ChatNotFound
                | ApiError::UserDeactivated
                | ApiError::BotKicked),
            ) => TelegramError::ChatUnavailable(api.to_string()),
            RequestError::Api(api) => TelegramError::Api(api.to_string()),
            RequestError::Network(err) => TelegramError::Network(err.to_string()),
            other => TelegramError::Api(other.to_string()),
        }
    }
}
