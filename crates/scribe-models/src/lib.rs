//! Core data models for Scribe.
//!
//! This crate provides the fundamental data types shared by every Scribe
//! crate: mentions fetched from the social platform, conversation records
//! linking a summarized Space to its thread, and references to downloaded
//! audio.

pub mod audio;
pub mod conversation;
pub mod ids;
pub mod mention;

// Re-export main types
pub use audio::{AudioArtifact, AudioReference};
pub use conversation::ConversationRecord;
pub use ids::{MentionId, PostId};
pub use mention::{sort_oldest_first, Mention};
