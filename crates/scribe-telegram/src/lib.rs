//! Telegram notification relay for Scribe.
//!
//! The summary bot pushes a notification for every posted summary onto the
//! file-backed queue in the state directory. [`TelegramRelay`] runs as its
//! own supervised integration and forwards those messages to the allowed
//! Telegram users, so the two integrations share no in-memory state.

pub mod error;
pub mod relay;

pub use error::{Result, TelegramError};
pub use relay::{MessageSender, TelegramRelay, TeloxideSender, CHANNEL};
