//! The summary bot integration.
//!
//! One poll cycle handles actions deferred by earlier cycles first, then
//! the mentions fetched in this cycle, oldest first. An action that cannot
//! finish stays at the head of the queue and ends the cycle, so nothing
//! queued behind it is answered first. A mention is marked processed only
//! once its outcome is committed: a reply was posted, the post was refused
//! for good, or there was nothing to answer.
//!
//! Everything that must outlive a restart of the integration lives in
//! [`BotState`], which the factory shares between rebuilt instances.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use scribe_audio::AudioFetcher;
use scribe_core::prompts::{AUDIO_UNAVAILABLE_REPLY, CONTENT_BLOCKED_REPLY, FALLBACK_REPLY};
use scribe_core::{
    fit_to_limit, AnswerContext, GenerationError, Summary, SummaryEngine, TwitterSettings,
};
use scribe_models::{
    AudioArtifact, AudioReference, ConversationRecord, Mention, MentionId, PostId,
};
use scribe_persistence::{NotificationQueue, ProcessedSet};
use scribe_runtime::{CycleError, Integration, RateLimiter, SlotGrant};

use crate::classify::{question_text, ClassifiedAction, Classification};
use crate::client::SocialApi;
use crate::conversation::{ConversationStore, DEFAULT_CONVERSATION_CAPACITY};
use crate::error::SocialError;
use crate::poller::{MentionPoller, DEFAULT_LOOKBACK};

/// Generation attempts before the fallback reply is posted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Static configuration of a summary bot.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Task name.
    pub name: String,
    /// Account the bot posts as, without `@`.
    pub bot_handle: String,
    /// Accounts whose mentions are searched, without `@`.
    pub accounts: Vec<String>,
    /// Phrase that requests a summary.
    pub trigger: String,
    /// Delay between cycles.
    pub poll_interval: Duration,
    /// Search window used before the first mention is seen.
    pub lookback: Duration,
    /// Maximum reply length in characters.
    pub max_post_chars: usize,
    /// Attempts for generation and posting before giving up.
    pub max_attempts: u32,
}

impl BotConfig {
    /// Creates a configuration with default timings.
    pub fn new(bot_handle: impl Into<String>, trigger: impl Into<String>) -> Self {
        let bot_handle = bot_handle.into().trim_start_matches('@').to_string();
        Self {
            name: "twitter".to_string(),
            accounts: vec![bot_handle.clone()],
            bot_handle,
            trigger: trigger.into(),
            poll_interval: Duration::from_secs(30),
            lookback: DEFAULT_LOOKBACK,
            max_post_chars: 280,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Builds the configuration from startup settings.
    pub fn from_settings(trigger: &str, settings: &TwitterSettings) -> Self {
        Self {
            accounts: settings.accounts.clone(),
            poll_interval: settings.poll_interval,
            lookback: settings.lookback,
            max_post_chars: settings.max_post_chars,
            ..Self::new(settings.bot_handle.clone(), trigger)
        }
    }

    /// Searches mentions of `accounts` instead of only the bot's own.
    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        if !accounts.is_empty() {
            self.accounts = accounts;
        }
        self
    }

    /// Sets the delay between cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum reply length.
    pub fn with_max_post_chars(mut self, max: usize) -> Self {
        self.max_post_chars = max;
        self
    }
}

/// What kind of reply is being sent, which decides what is recorded after
/// it is posted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplyKind {
    Summary,
    Answer { root: MentionId },
    Neutral,
}

#[derive(Debug, Clone)]
struct PreparedReply {
    text: String,
    kind: ReplyKind,
}

/// An action and the work already done for it.
#[derive(Debug)]
struct PendingAction {
    action: ClassifiedAction,
    generation_attempts: u32,
    post_attempts: u32,
    audio: Option<AudioArtifact>,
    summary: Option<Summary>,
    /// Reference a follow-up answer was generated from, when it differs
    /// from the one on record.
    renewed_audio: Option<AudioReference>,
    reply: Option<PreparedReply>,
}

impl PendingAction {
    fn new(action: ClassifiedAction) -> Self {
        Self {
            action,
            generation_attempts: 0,
            post_attempts: 0,
            audio: None,
            summary: None,
            renewed_audio: None,
            reply: None,
        }
    }

    fn id(&self) -> &MentionId {
        &self.action.mention.id
    }
}

enum Outcome {
    /// The mention is finished with.
    Done,
    /// Not finished; keep it first in line and stop for this cycle.
    Hold(PendingAction),
}

/// State shared by every instance of one summary bot.
pub struct BotState {
    conversations: RwLock<ConversationStore>,
    limiter: RateLimiter,
    cursor: Mutex<Option<PostId>>,
    backlog: Mutex<Vec<Mention>>,
    deferred: Mutex<VecDeque<PendingAction>>,
    processed: Mutex<ProcessedSet>,
    notifications: Option<NotificationQueue>,
}

impl BotState {
    /// Creates state around a loaded processed set and a post limiter.
    pub fn new(processed: ProcessedSet, limiter: RateLimiter) -> Self {
        Self {
            conversations: RwLock::new(ConversationStore::new(DEFAULT_CONVERSATION_CAPACITY)),
            limiter,
            cursor: Mutex::new(None),
            backlog: Mutex::new(Vec::new()),
            deferred: Mutex::new(VecDeque::new()),
            processed: Mutex::new(processed),
            notifications: None,
        }
    }

    /// Limits the number of conversations kept for follow-ups.
    pub fn with_conversation_capacity(mut self, capacity: usize) -> Self {
        self.conversations = RwLock::new(ConversationStore::new(capacity));
        self
    }

    /// Announces posted summaries on `queue`.
    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    /// The post limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Newest mention id seen.
    pub async fn cursor(&self) -> Option<PostId> {
        self.cursor.lock().await.clone()
    }

    /// Actions waiting for a later cycle.
    pub async fn deferred_len(&self) -> usize {
        self.deferred.lock().await.len()
    }

    /// Fetched mentions still waiting to be classified.
    pub async fn backlog_len(&self) -> usize {
        self.backlog.lock().await.len()
    }

    /// Returns true if the mention has been handled.
    pub async fn is_processed(&self, id: &MentionId) -> bool {
        self.processed.lock().await.contains(id)
    }

    /// Returns the conversation rooted at `root`.
    pub async fn conversation(&self, root: &MentionId) -> Option<ConversationRecord> {
        self.conversations.read().await.get(root).cloned()
    }

    /// Finds the conversation a post belongs to.
    pub async fn resolve_conversation(&self, post: &PostId) -> Option<MentionId> {
        self.conversations.read().await.resolve(post).cloned()
    }

    async fn mark_processed(&self, id: &MentionId) {
        let mut processed = self.processed.lock().await;
        processed.insert(id.clone());
        if let Err(e) = processed.save() {
            warn!(error = %e, "Failed to save processed mentions");
        }
    }
}

/// Summarizes Spaces on request and answers follow-up questions.
pub struct SummaryBot {
    config: BotConfig,
    api: Arc<dyn SocialApi>,
    fetcher: Arc<dyn AudioFetcher>,
    engine: Arc<dyn SummaryEngine>,
    poller: MentionPoller,
    state: Arc<BotState>,
}

impl SummaryBot {
    /// Creates a bot instance over shared state.
    pub fn new(
        config: BotConfig,
        api: Arc<dyn SocialApi>,
        fetcher: Arc<dyn AudioFetcher>,
        engine: Arc<dyn SummaryEngine>,
        state: Arc<BotState>,
    ) -> Self {
        let poller = MentionPoller::new(Arc::clone(&api), &config.bot_handle, &config.trigger)
            .with_accounts(&config.accounts)
            .with_lookback(config.lookback);
        Self {
            config,
            api,
            fetcher,
            engine,
            poller,
            state,
        }
    }

    /// Fetches and classifies new mentions, queueing the actionable ones.
    ///
    /// Fails after queueing if classification was interrupted.
    async fn poll_mentions(&self) -> Result<(), CycleError> {
        let batch = {
            let mut cursor = self.state.cursor.lock().await;
            let mut processed = self.state.processed.lock().await;
            let conversations = self.state.conversations.read().await;
            let mut backlog = self.state.backlog.lock().await;

            let batch = self
                .poller
                .poll(&mut cursor, &mut processed, &conversations, &mut backlog)
                .await
                .map_err(|e| api_error("mention search", e))?;

            if let Err(e) = processed.save() {
                warn!(error = %e, "Failed to save processed mentions");
            }
            batch
        };

        let mut deferred = self.state.deferred.lock().await;
        for action in batch.actions {
            if deferred.iter().any(|p| p.id() == &action.mention.id) {
                continue;
            }
            debug!(id = %action.mention.id, kind = ?action.kind, "Queued mention");
            deferred.push_back(PendingAction::new(action));
        }

        match batch.interrupted {
            Some(e) => Err(api_error("post lookup", e)),
            None => Ok(()),
        }
    }

    async fn process(&self, mut pending: PendingAction) -> Result<Outcome, CycleError> {
        if pending.reply.is_none() {
            let prepared = match &pending.action.kind {
                Classification::SummarizeRequest { space_url } => {
                    let space_url = space_url.clone();
                    self.prepare_summary(&mut pending, &space_url).await
                }
                Classification::FollowUp { root } => {
                    let root = root.clone();
                    self.prepare_answer(&mut pending, root).await
                }
                Classification::Ignore(_) => None,
            };

            match prepared {
                Some(Prepared::Reply(reply)) => pending.reply = Some(reply),
                Some(Prepared::Retry) => return Ok(Outcome::Hold(pending)),
                None => {
                    self.state.mark_processed(pending.id()).await;
                    return Ok(Outcome::Done);
                }
            }
        }

        self.post(pending).await
    }

    async fn prepare_summary(
        &self,
        pending: &mut PendingAction,
        space_url: &str,
    ) -> Option<Prepared> {
        let audio = match &pending.audio {
            Some(audio) => audio.clone(),
            None => match self.fetcher.fetch(space_url).await {
                Ok(audio) => {
                    pending.audio = Some(audio.clone());
                    audio
                }
                Err(e) => {
                    warn!(id = %pending.id(), url = %space_url, error = %e, "Space audio unavailable");
                    return Some(Prepared::neutral(AUDIO_UNAVAILABLE_REPLY));
                }
            },
        };

        match self.engine.summarize(&audio).await {
            Ok(summary) => {
                info!(id = %pending.id(), chars = summary.text.chars().count(), "Generated summary");
                let text = fit_to_limit(&summary.text, self.config.max_post_chars);
                pending.summary = Some(summary);
                Some(Prepared::Reply(PreparedReply {
                    text,
                    kind: ReplyKind::Summary,
                }))
            }
            Err(e) => Some(self.generation_failed(pending, e)),
        }
    }

    async fn prepare_answer(&self, pending: &mut PendingAction, root: MentionId) -> Option<Prepared> {
        let record = self.state.conversations.read().await.get(&root).cloned();
        let Some(record) = record else {
            debug!(id = %pending.id(), root = %root, "Conversation no longer held, ignoring follow-up");
            return None;
        };

        let question = question_text(&pending.action.mention.text).to_string();
        let context = AnswerContext {
            summary: &record.summary_text,
            audio: &record.audio_reference,
        };

        match self.engine.answer(&question, context).await {
            Ok(answer) => {
                if answer.audio != record.audio_reference {
                    pending.renewed_audio = Some(answer.audio);
                }
                Some(Prepared::Reply(PreparedReply {
                    text: fit_to_limit(&answer.text, self.config.max_post_chars),
                    kind: ReplyKind::Answer { root },
                }))
            }
            Err(e) => Some(self.generation_failed(pending, e)),
        }
    }

    fn generation_failed(&self, pending: &mut PendingAction, e: GenerationError) -> Prepared {
        if let GenerationError::ContentBlocked(reason) = &e {
            warn!(id = %pending.id(), reason = %reason, "Content blocked by AI service");
            return Prepared::neutral(CONTENT_BLOCKED_REPLY);
        }

        pending.generation_attempts += 1;
        if e.is_transient() && pending.generation_attempts < self.config.max_attempts {
            warn!(
                id = %pending.id(),
                attempt = pending.generation_attempts,
                error = %e,
                "Generation failed, retrying next cycle"
            );
            return Prepared::Retry;
        }

        error!(id = %pending.id(), attempts = pending.generation_attempts, error = %e, "Generation failed");
        Prepared::neutral(FALLBACK_REPLY)
    }

    async fn post(&self, mut pending: PendingAction) -> Result<Outcome, CycleError> {
        let Some(reply) = pending.reply.clone() else {
            return Ok(Outcome::Done);
        };

        match self.state.limiter.acquire_post_slot() {
            SlotGrant::Immediate => {}
            SlotGrant::WaitUntil(at) => {
                debug!(id = %pending.id(), wait = ?at.saturating_duration_since(Instant::now()), "Waiting for post slot");
                tokio::time::sleep_until(at).await;
            }
            SlotGrant::Deferred => {
                info!(id = %pending.id(), "Post deferred to a later cycle");
                return Ok(Outcome::Hold(pending));
            }
        }

        let in_reply_to = pending.id().clone();
        match self.api.post_reply(&reply.text, &in_reply_to).await {
            Ok(reply_id) => {
                info!(id = %in_reply_to, reply = %reply_id, kind = ?reply.kind, "Posted reply");
                self.commit(&pending, reply, reply_id).await;
                Ok(Outcome::Done)
            }
            Err(SocialError::RateLimited { reset_at }) => {
                let reset_at = reset_at.map(instant_from);
                if let Some(at) = reset_at {
                    self.state.limiter.pause_until(at);
                }
                self.state.deferred.lock().await.push_front(pending);
                Err(CycleError::RateLimited {
                    reason: "posting rate limited".to_string(),
                    reset_at,
                })
            }
            Err(SocialError::Unauthorized(message)) => {
                self.state.deferred.lock().await.push_front(pending);
                Err(CycleError::Fatal(format!("reply rejected: {}", message)))
            }
            Err(e @ (SocialError::Forbidden(_) | SocialError::NotFound(_))) => {
                warn!(id = %in_reply_to, error = %e, "Reply refused, dropping");
                self.drop_action(&pending).await;
                Ok(Outcome::Done)
            }
            Err(e) => {
                pending.post_attempts += 1;
                if pending.post_attempts >= self.config.max_attempts {
                    error!(id = %in_reply_to, attempts = pending.post_attempts, error = %e, "Giving up on reply");
                    self.drop_action(&pending).await;
                    Ok(Outcome::Done)
                } else {
                    warn!(id = %in_reply_to, error = %e, "Reply failed, retrying next cycle");
                    Ok(Outcome::Hold(pending))
                }
            }
        }
    }

    async fn commit(&self, pending: &PendingAction, reply: PreparedReply, reply_id: PostId) {
        let mention = &pending.action.mention;

        match reply.kind {
            ReplyKind::Summary => {
                if let Some(summary) = &pending.summary {
                    let record = ConversationRecord::new(
                        mention.id.clone(),
                        summary.audio.clone(),
                        summary.text.clone(),
                    );
                    let evicted = {
                        let mut conversations = self.state.conversations.write().await;
                        let evicted = conversations.insert(record);
                        conversations.add_alias(reply_id, &mention.id);
                        evicted
                    };
                    for record in evicted {
                        self.release_audio(&record.audio_reference.local_path).await;
                    }
                }
                self.notify(pending);
            }
            ReplyKind::Answer { root } => {
                let mut conversations = self.state.conversations.write().await;
                if let Some(audio) = &pending.renewed_audio {
                    conversations.update_audio(&root, audio.clone());
                }
                conversations.add_alias(reply_id, &root);
                conversations.mark_answered(&root);
            }
            ReplyKind::Neutral => {
                if let Some(audio) = &pending.audio {
                    self.release_audio(&audio.path).await;
                }
            }
        }

        self.state.mark_processed(&mention.id).await;
    }

    /// Finishes an action whose reply will never be posted.
    async fn drop_action(&self, pending: &PendingAction) {
        if let Some(audio) = &pending.audio {
            self.release_audio(&audio.path).await;
        }
        self.state.mark_processed(pending.id()).await;
    }

    async fn release_audio(&self, path: &Path) {
        if let Err(e) = self.fetcher.release(path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete Space audio");
        }
    }

    fn notify(&self, pending: &PendingAction) {
        let Some(queue) = &self.state.notifications else {
            return;
        };
        let space = match &pending.action.kind {
            Classification::SummarizeRequest { space_url } => space_url.as_str(),
            _ => "",
        };
        let message = format!(
            "Posted a Space summary for @{}: {}",
            pending.action.mention.author, space
        );
        if let Err(e) = queue.push(message) {
            warn!(error = %e, "Failed to queue notification");
        }
    }
}

enum Prepared {
    Reply(PreparedReply),
    Retry,
}

impl Prepared {
    fn neutral(text: &str) -> Self {
        Prepared::Reply(PreparedReply {
            text: text.to_string(),
            kind: ReplyKind::Neutral,
        })
    }
}

#[async_trait]
impl Integration for SummaryBot {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    async fn poll_cycle(&mut self) -> Result<(), CycleError> {
        self.poll_mentions().await?;

        loop {
            let next = self.state.deferred.lock().await.pop_front();
            let Some(pending) = next else {
                break;
            };

            match self.process(pending).await? {
                Outcome::Done => {}
                Outcome::Hold(pending) => {
                    self.state.deferred.lock().await.push_front(pending);
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Maps a failed read to what the supervisor should do.
fn api_error(operation: &str, e: SocialError) -> CycleError {
    match e {
        SocialError::RateLimited { reset_at } => CycleError::RateLimited {
            reason: format!("{} rate limited", operation),
            reset_at: reset_at.map(instant_from),
        },
        SocialError::Unauthorized(message) | SocialError::Forbidden(message) => {
            CycleError::Fatal(format!("{} rejected: {}", operation, message))
        }
        other => CycleError::Transient(format!("{} failed: {}", operation, other)),
    }
}

fn instant_from(at: DateTime<Utc>) -> Instant {
    let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}
