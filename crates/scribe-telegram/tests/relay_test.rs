//! Relay cycles against a recording sender and a real queue file.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use scribe_persistence::NotificationQueue;
use scribe_runtime::{CycleError, Integration};
use scribe_telegram::{MessageSender, TelegramError, TelegramRelay, CHANNEL};

/// Records delivered messages. Each call consumes one scripted outcome,
/// `None` meaning success; an empty script always succeeds.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(i64, String)>>,
    script: Mutex<VecDeque<Option<TelegramError>>>,
    unreachable: HashSet<i64>,
}

impl RecordingSender {
    fn scripted(outcomes: Vec<Option<TelegramError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: i64, text: &str) -> scribe_telegram::Result<()> {
        if self.unreachable.contains(&chat_id) {
            return Err(TelegramError::ChatUnavailable("bot was blocked by the user".into()));
        }
        if let Some(Some(e)) = self.script.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

fn setup(
    sender: RecordingSender,
    users: Vec<i64>,
) -> (TempDir, NotificationQueue, Arc<RecordingSender>, TelegramRelay) {
    let dir = tempfile::tempdir().unwrap();
    let queue = NotificationQueue::new(dir.path().join("notifications.json"));
    let sender = Arc::new(sender);
    let relay = TelegramRelay::new(sender.clone(), queue.clone(), users)
        .with_poll_interval(Duration::from_secs(1));
    (dir, queue, sender, relay)
}

#[tokio::test]
async fn test_relays_to_every_user_once() {
    let (_dir, queue, sender, mut relay) = setup(RecordingSender::default(), vec![11, 22]);
    queue.push("Posted a Space summary for @alice").unwrap();
    queue.push("Posted a Space summary for @bob").unwrap();

    relay.poll_cycle().await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0], (11, "Posted a Space summary for @alice".to_string()));
    assert_eq!(sent[1], (22, "Posted a Space summary for @alice".to_string()));
    assert!(queue.unread(CHANNEL).is_empty());

    relay.poll_cycle().await.unwrap();
    assert_eq!(sender.sent().len(), 4);
}

#[tokio::test]
async fn test_without_users_notifications_are_dropped() {
    let (_dir, queue, sender, mut relay) = setup(RecordingSender::default(), Vec::new());
    queue.push("Posted a Space summary for @alice").unwrap();

    relay.poll_cycle().await.unwrap();

    assert!(sender.sent().is_empty());
    assert!(queue.unread(CHANNEL).is_empty());
}

#[tokio::test]
async fn test_unreachable_chat_does_not_block_others() {
    let sender = RecordingSender {
        unreachable: HashSet::from([11]),
        ..Default::default()
    };
    let (_dir, queue, sender, mut relay) = setup(sender, vec![11, 22]);
    queue.push("Posted a Space summary for @alice").unwrap();

    relay.poll_cycle().await.unwrap();

    assert_eq!(sender.sent(), vec![(22, "Posted a Space summary for @alice".to_string())]);
    assert!(queue.unread(CHANNEL).is_empty());
}

#[tokio::test]
async fn test_flood_control_backs_off_and_keeps_undelivered() {
    let sender = RecordingSender::scripted(vec![
        None,
        Some(TelegramError::RetryAfter(Duration::from_secs(30))),
    ]);
    let (_dir, queue, sender, mut relay) = setup(sender, vec![11]);
    queue.push("first").unwrap();
    queue.push("second").unwrap();

    let result = relay.poll_cycle().await;
    assert!(matches!(
        result,
        Err(CycleError::RateLimited { reset_at: Some(_), .. })
    ));

    let unread = queue.unread(CHANNEL);
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].message, "second");

    relay.poll_cycle().await.unwrap();
    assert_eq!(
        sender.sent(),
        vec![(11, "first".to_string()), (11, "second".to_string())]
    );
    assert!(queue.unread(CHANNEL).is_empty());
}

#[tokio::test]
async fn test_rejected_token_is_fatal() {
    let sender = RecordingSender::scripted(vec![Some(TelegramError::InvalidToken)]);
    let (_dir, queue, _sender, mut relay) = setup(sender, vec![11]);
    queue.push("Posted a Space summary for @alice").unwrap();

    let result = relay.poll_cycle().await;

    assert!(matches!(result, Err(CycleError::Fatal(_))));
    assert_eq!(queue.unread(CHANNEL).len(), 1);
    assert_eq!(relay.name(), CHANNEL);
}
