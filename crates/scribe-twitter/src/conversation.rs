//! Conversation records for follow-up questions.
//!
//! Records are keyed by the mention that requested the summary. The ids of
//! the bot's own replies in that thread are kept as aliases, so a reply to
//! the summary (or to a later answer) resolves to the same record.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use scribe_models::{AudioReference, ConversationRecord, MentionId, PostId};

/// Default number of conversations retained.
pub const DEFAULT_CONVERSATION_CAPACITY: usize = 500;

/// LRU-bounded conversation records with reply aliases.
#[derive(Debug)]
pub struct ConversationStore {
    capacity: usize,
    records: HashMap<MentionId, ConversationRecord>,
    aliases: HashMap<PostId, MentionId>,
    /// Least recently used first.
    recency: VecDeque<MentionId>,
}

impl ConversationStore {
    /// Creates a store holding at most `capacity` conversations.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: HashMap::new(),
            aliases: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Adds a record, evicting the least recently used ones if full.
    ///
    /// Returns the evicted records so their audio can be released.
    pub fn insert(&mut self, record: ConversationRecord) -> Vec<ConversationRecord> {
        let root = record.root_mention_id.clone();
        self.records.insert(root.clone(), record);
        self.touch(&root);

        let mut evicted = Vec::new();
        while self.records.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.aliases.retain(|_, r| *r != oldest);
            if let Some(record) = self.records.remove(&oldest) {
                debug!(root = %oldest, "Evicted conversation");
                evicted.push(record);
            }
        }
        evicted
    }

    /// Links one of the bot's reply ids to a conversation.
    pub fn add_alias(&mut self, post: PostId, root: &MentionId) {
        if self.records.contains_key(root) {
            self.aliases.insert(post, root.clone());
        }
    }

    /// Finds the conversation a post belongs to.
    pub fn resolve(&self, post: &PostId) -> Option<&MentionId> {
        if let Some(root) = self.aliases.get(post) {
            return Some(root);
        }
        self.records.get_key_value(post).map(|(root, _)| root)
    }

    /// Returns a record without affecting recency.
    pub fn get(&self, root: &MentionId) -> Option<&ConversationRecord> {
        self.records.get(root)
    }

    /// Records that a follow-up was answered and marks the conversation
    /// as recently used.
    pub fn mark_answered(&mut self, root: &MentionId) {
        if let Some(record) = self.records.get_mut(root) {
            record.mark_answered();
            self.touch(root);
        }
    }

    /// Replaces the audio reference of a conversation, e.g. after the
    /// recording was uploaded again.
    pub fn update_audio(&mut self, root: &MentionId, audio: AudioReference) {
        if let Some(record) = self.records.get_mut(root) {
            record.audio_reference = audio;
        }
    }

    /// Number of conversations held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no conversation is held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn touch(&mut self, root: &MentionId) {
        self.recency.retain(|r| r != root);
        self.recency.push_back(root.clone());
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERSATION_CAPACITY)
    }
}
