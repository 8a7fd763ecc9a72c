//! Relays queued notifications to Telegram chats.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use scribe_core::TelegramSettings;
use scribe_persistence::NotificationQueue;
use scribe_runtime::{CycleError, Integration};

use crate::error::{Result, TelegramError};

/// Channel name recorded in `read_by` for delivered notifications.
pub const CHANNEL: &str = "telegram";

/// Sends a text message to a chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `text` to `chat_id`.
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// [`MessageSender`] backed by the Telegram Bot API.
pub struct TeloxideSender {
    bot: Bot,
}

impl TeloxideSender {
    /// Creates a sender for the bot with this token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl MessageSender for TeloxideSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(())
    }
}

/// Integration that forwards unread notifications to allowed users.
pub struct TelegramRelay {
    sender: Arc<dyn MessageSender>,
    queue: NotificationQueue,
    allowed_users: Vec<i64>,
    poll_interval: Duration,
}

impl TelegramRelay {
    /// Creates a relay over a sender and the shared notification queue.
    pub fn new(
        sender: Arc<dyn MessageSender>,
        queue: NotificationQueue,
        allowed_users: Vec<i64>,
    ) -> Self {
        Self {
            sender,
            queue,
            allowed_users,
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Creates a relay from startup settings.
    pub fn from_settings(
        sender: Arc<dyn MessageSender>,
        queue: NotificationQueue,
        settings: &TelegramSettings,
    ) -> Self {
        Self::new(sender, queue, settings.allowed_users.clone())
            .with_poll_interval(settings.poll_interval)
    }

    /// Sets the delay between relay cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn mark_read(&self, ids: &[String]) -> std::result::Result<(), CycleError> {
        self.queue
            .mark_read(CHANNEL, ids)
            .map_err(|e| CycleError::Transient(format!("failed to mark notifications read: {}", e)))
    }
}

#[async_trait]
impl Integration for TelegramRelay {
    fn name(&self) -> &str {
        CHANNEL
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn poll_cycle(&mut self) -> std::result::Result<(), CycleError> {
        let notifications = self.queue.unread(CHANNEL);
        if notifications.is_empty() {
            return Ok(());
        }

        if self.allowed_users.is_empty() {
            // Nobody to deliver to; drop them instead of letting them pile up.
            debug!(count = notifications.len(), "No Telegram users configured");
            let ids: Vec<String> = notifications.into_iter().map(|n| n.id).collect();
            return self.mark_read(&ids);
        }

        let mut sent_ids = Vec::new();
        for notification in &notifications {
            for &chat_id in &self.allowed_users {
                match self.sender.send(chat_id, &notification.message).await {
                    Ok(()) => {
                        info!(chat_id = %chat_id, notification_id = %notification.id, "Notification sent");
                    }
                    Err(TelegramError::RetryAfter(wait)) => {
                        self.mark_read(&sent_ids)?;
                        return Err(CycleError::RateLimited {
                            reason: "telegram flood control".to_string(),
                            reset_at: Some(Instant::now() + wait),
                        });
                    }
                    Err(TelegramError::InvalidToken) => {
                        self.mark_read(&sent_ids)?;
                        return Err(CycleError::Fatal(TelegramError::InvalidToken.to_string()));
                    }
                    Err(e) => {
                        warn!(chat_id = %chat_id, error = %e, "Failed to send notification");
                    }
                }
            }
            sent_ids.push(notification.id.clone());
        }

        self.mark_read(&sent_ids)
    }
}
