//! Conversation records.
//!
//! A record is created when a summarize request succeeds and links the
//! root mention to the summary and the audio it was produced from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioReference;
use crate::ids::MentionId;

/// State kept for a summarized Space so follow-ups can be answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// The mention that requested the summary.
    pub root_mention_id: MentionId,

    /// Audio the summary was generated from.
    pub audio_reference: AudioReference,

    /// The generated summary text.
    pub summary_text: String,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When a follow-up was last answered from this record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_answered_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// Creates a record for a freshly summarized mention.
    pub fn new(
        root_mention_id: MentionId,
        audio_reference: AudioReference,
        summary_text: impl Into<String>,
    ) -> Self {
        Self {
            root_mention_id,
            audio_reference,
            summary_text: summary_text.into(),
            created_at: Utc::now(),
            last_answered_at: None,
        }
    }

    /// Records that a follow-up was answered.
    pub fn mark_answered(&mut self) {
        self.last_answered_at = Some(Utc::now());
    }
}
