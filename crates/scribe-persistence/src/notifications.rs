//! File-backed notification queue shared between integrations.
//!
//! The summary bot pushes a notification after each posted summary and
//! the Telegram relay polls for the ones it has not delivered yet. The
//! two never share memory; the file is the only channel between them.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::atomic::{read_json, write_json};
use crate::error::Result;

/// Maximum number of notifications kept in the file.
pub const MAX_NOTIFICATIONS: usize = 100;

/// Age after which a notification is dropped, in seconds.
pub const NOTIFICATION_EXPIRY_SECS: i64 = 3600;

/// Serializes read-modify-write cycles within this process.
static FILE_LOCK: Mutex<()> = Mutex::new(());

/// A message to relay to other channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id.
    pub id: String,
    /// Message text.
    pub message: String,
    /// When it was pushed.
    pub created_at: DateTime<Utc>,
    /// Channels that have delivered it.
    #[serde(default)]
    pub read_by: HashSet<String>,
}

impl Notification {
    /// Creates a fresh notification.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            created_at: Utc::now(),
            read_by: HashSet::new(),
        }
    }

    /// Returns true once the notification is older than the expiry window.
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::seconds(NOTIFICATION_EXPIRY_SECS)
    }

    /// Returns true if `channel` has delivered this notification.
    pub fn is_read_by(&self, channel: &str) -> bool {
        self.read_by.contains(channel)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    notifications: VecDeque<Notification>,
}

/// Handle on the notification file.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    path: PathBuf,
}

impl NotificationQueue {
    /// Opens the queue stored at `path`. The file is created on first push.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends a notification, dropping expired and surplus entries.
    pub fn push(&self, message: impl Into<String>) -> Result<Notification> {
        let notification = Notification::new(message);
        let _guard = lock();

        let mut file = self.load();
        file.notifications.retain(|n| !n.is_expired());
        while file.notifications.len() >= MAX_NOTIFICATIONS {
            file.notifications.pop_front();
        }
        debug!(id = %notification.id, "Pushing notification");
        file.notifications.push_back(notification.clone());

        write_json(&self.path, &file)?;
        Ok(notification)
    }

    /// Notifications `channel` has not delivered yet, oldest first.
    pub fn unread(&self, channel: &str) -> Vec<Notification> {
        let _guard = lock();
        self.load()
            .notifications
            .into_iter()
            .filter(|n| !n.is_expired() && !n.is_read_by(channel))
            .collect()
    }

    /// Records that `channel` delivered the given notifications.
    pub fn mark_read(&self, channel: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _guard = lock();

        let mut file = self.load();
        file.notifications.retain(|n| !n.is_expired());
        for n in file.notifications.iter_mut() {
            if ids.contains(&n.id) {
                n.read_by.insert(channel.to_string());
            }
        }
        write_json(&self.path, &file)
    }

    fn load(&self) -> QueueFile {
        match read_json::<QueueFile>(&self.path) {
            Ok(file) => file.unwrap_or_default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read notifications file");
                QueueFile::default()
            }
        }
    }
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    FILE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_push_and_read() {
        let dir = tempdir().unwrap();
        let queue = NotificationQueue::new(dir.path().join("notifications.json"));

        let first = queue.push("Summary posted for @alice").unwrap();
        queue.push("Summary posted for @bob").unwrap();

        let unread = queue.unread("telegram");
        assert_eq!(unread.len(), 2);
        assert_eq!(unread[0].id, first.id);

        queue.mark_read("telegram", &[first.id.clone()]).unwrap();
        let unread = queue.unread("telegram");
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "Summary posted for @bob");

        // Other channels are tracked separately.
        assert_eq!(queue.unread("other").len(), 2);
    }

    #[test]
    fn test_capacity() {
        let dir = tempdir().unwrap();
        let queue = NotificationQueue::new(dir.path().join("notifications.json"));

        for i in 0..(MAX_NOTIFICATIONS + 5) {
            queue.push(format!("message {}", i)).unwrap();
        }

        let unread = queue.unread("telegram");
        assert_eq!(unread.len(), MAX_NOTIFICATIONS);
        assert_eq!(unread[0].message, "message 5");
    }

    #[test]
    fn test_expiry() {
        let mut old = Notification::new("old");
        old.created_at = Utc::now() - Duration::hours(2);
        assert!(old.is_expired());
        assert!(!Notification::new("fresh").is_expired());
    }

    #[test]
    fn test_expired_entries_are_not_returned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notifications.json");

        let mut old = Notification::new("stale");
        old.created_at = Utc::now() - Duration::hours(2);
        let file = QueueFile {
            notifications: VecDeque::from([old, Notification::new("fresh")]),
        };
        write_json(&path, &file).unwrap();

        let unread = NotificationQueue::new(&path).unread("telegram");
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "fresh");
    }
}
