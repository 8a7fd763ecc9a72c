//! Persistence layer for Scribe.
//!
//! Crash-safe state files written with atomic renames:
//!
//! - **processed**: ids of mentions already handled, so restarts do not
//!   answer them twice
//! - **notifications**: queue through which the summary bot hands
//!   messages to the Telegram relay
//!
//! # Example
//!
//! ```no_run
//! use scribe_persistence::{NotificationQueue, ProcessedSet};
//! use scribe_models::MentionId;
//!
//! let mut processed = ProcessedSet::load("/home/user/.scribe/state/processed-twitter.json");
//! if processed.insert(MentionId::from("1790000000000000000")) {
//!     processed.save().unwrap();
//! }
//!
//! let queue = NotificationQueue::new("/home/user/.scribe/state/notifications.json");
//! queue.push("Summary posted").unwrap();
//! ```

pub mod atomic;
pub mod error;
pub mod notifications;
pub mod processed;

pub use error::{PersistenceError, Result};
pub use notifications::{Notification, NotificationQueue};
pub use processed::ProcessedSet;
