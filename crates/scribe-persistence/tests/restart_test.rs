//! State written by one process instance is visible to the next.

use scribe_models::MentionId;
use scribe_persistence::{NotificationQueue, ProcessedSet};
use tempfile::tempdir;

#[test]
fn test_processed_ids_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state/processed-twitter.json");

    {
        let mut first_run = ProcessedSet::load(&path);
        assert!(first_run.insert(MentionId::from("1800000000000000001")));
        first_run.save().unwrap();
    }

    let mut second_run = ProcessedSet::load(&path);
    assert!(!second_run.insert(MentionId::from("1800000000000000001")));
    assert!(second_run.insert(MentionId::from("1800000000000000002")));
}

#[test]
fn test_disk_copy_is_bounded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("processed.json");

    let mut set = ProcessedSet::load(&path).with_capacity(10);
    for i in 0..25 {
        set.insert(MentionId::from(format!("{}", 1000 + i)));
    }
    set.save().unwrap();

    let reloaded = ProcessedSet::load(&path);
    assert_eq!(reloaded.len(), 10);
    assert!(reloaded.contains(&MentionId::from("1024")));
    assert!(!reloaded.contains(&MentionId::from("1000")));
}

#[test]
fn test_writer_and_reader_handles_share_the_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notifications.json");

    let writer = NotificationQueue::new(&path);
    let reader = NotificationQueue::new(&path);

    writer.push("Summary posted in reply to @carol").unwrap();

    let unread = reader.unread("telegram");
    assert_eq!(unread.len(), 1);
    reader
        .mark_read("telegram", &[unread[0].id.clone()])
        .unwrap();

    assert!(writer.unread("telegram").is_empty());
}
