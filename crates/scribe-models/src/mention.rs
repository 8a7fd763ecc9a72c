//! Mentions fetched from the social platform.
//!
//! A mention is immutable once fetched. The platform remains the source of
//! truth; Scribe only keeps what it needs to classify and answer it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{MentionId, PostId};

/// A platform post that references the bot's handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Platform-assigned identifier.
    pub id: MentionId,

    /// Handle of the author, without the leading `@`.
    pub author: String,

    /// Full text of the post.
    pub text: String,

    /// When the post was created.
    pub created_at: DateTime<Utc>,

    /// The post this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<PostId>,

    /// Space URL found directly on this post, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_url: Option<String>,

    /// Expanded URL entities attached to the post.
    #[serde(default)]
    pub urls: Vec<String>,
}

impl Mention {
    /// Creates a mention with the required fields.
    pub fn new(
        id: impl Into<MentionId>,
        author: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            created_at,
            parent_id: None,
            space_url: None,
            urls: Vec::new(),
        }
    }

    /// Sets the post this mention replies to.
    pub fn with_parent(mut self, parent_id: impl Into<PostId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the Space URL carried by this mention.
    pub fn with_space_url(mut self, url: impl Into<String>) -> Self {
        self.space_url = Some(url.into());
        self
    }

    /// Adds an expanded URL entity.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Returns true if this mention is a reply to another post.
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Sorts mentions oldest first.
///
/// Creation time decides; equal timestamps fall back to id order so that
/// the result is deterministic for posts created within the same second.
pub fn sort_oldest_first(mentions: &mut [Mention]) {
    mentions.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
