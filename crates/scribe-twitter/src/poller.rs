//! Mention polling.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use scribe_core::contains_trigger;
use scribe_models::{sort_oldest_first, Mention, PostId};
use scribe_persistence::ProcessedSet;

use crate::classify::{classify, ClassifiedAction, Classification};
use crate::client::{Since, SocialApi};
use crate::conversation::ConversationStore;
use crate::error::SocialError;
use crate::resolve::space_url_in;

/// Default search window when no cursor is known.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(15 * 60);

/// The outcome of one poll.
#[derive(Debug, Default)]
pub struct PollBatch {
    /// Actionable mentions, oldest first.
    pub actions: Vec<ClassifiedAction>,
    /// Error that stopped classification part way. The mention it hit and
    /// every newer one were put back in the backlog.
    pub interrupted: Option<SocialError>,
}

/// Fetches new mentions and classifies them.
pub struct MentionPoller {
    api: Arc<dyn SocialApi>,
    bot_handle: String,
    trigger: String,
    lookback: Duration,
    query: String,
}

impl MentionPoller {
    /// Creates a poller for mentions of `bot_handle`.
    pub fn new(api: Arc<dyn SocialApi>, bot_handle: &str, trigger: &str) -> Self {
        let bot_handle = bot_handle.trim_start_matches('@').to_string();
        let query = mention_query(std::slice::from_ref(&bot_handle));
        Self {
            api,
            bot_handle,
            trigger: trigger.to_string(),
            lookback: DEFAULT_LOOKBACK,
            query,
        }
    }

    /// Searches mentions of every handle in `accounts` instead of only the
    /// bot's own. An empty list keeps the current query.
    pub fn with_accounts(mut self, accounts: &[String]) -> Self {
        if !accounts.is_empty() {
            self.query = mention_query(accounts);
        }
        self
    }

    /// Sets the window searched when there is no cursor.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// The search query.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fetches mentions newer than `cursor` and classifies them together
    /// with the `backlog` left by an interrupted poll.
    ///
    /// On a fetch error nothing is changed. Otherwise the cursor moves to
    /// the newest fetched id, ignored and unprocessable mentions are added
    /// to `processed`, and actionable ones are returned oldest first. The
    /// caller marks those processed once it has handled them.
    ///
    /// If resolving a mention fails for a reason that may clear up (rate
    /// limit, network, server error), classification stops there: that
    /// mention and the newer ones go back into `backlog` and the error is
    /// reported in [`PollBatch::interrupted`].
    pub async fn poll(
        &self,
        cursor: &mut Option<PostId>,
        processed: &mut ProcessedSet,
        conversations: &ConversationStore,
        backlog: &mut Vec<Mention>,
    ) -> Result<PollBatch, SocialError> {
        let since = match cursor {
            Some(id) => Since::Id(id.clone()),
            None => {
                let lookback = chrono::Duration::from_std(self.lookback)
                    .unwrap_or_else(|_| chrono::Duration::minutes(15));
                Since::Time(Utc::now() - lookback)
            }
        };

        let fetched = self.api.search_mentions(&self.query, &since).await?;

        if let Some(newest) = fetched.iter().map(|m| &m.id).max() {
            if cursor.as_ref().map_or(true, |c| newest > c) {
                *cursor = Some(newest.clone());
            }
        }

        let mut seen = HashSet::new();
        let mut fresh: Vec<Mention> = backlog
            .drain(..)
            .chain(fetched)
            .filter(|m| !processed.contains(&m.id) && seen.insert(m.id.clone()))
            .collect();
        sort_oldest_first(&mut fresh);

        if !fresh.is_empty() {
            info!(count = fresh.len(), "New mentions");
        }

        let mut batch = PollBatch::default();
        let mut remaining = fresh.into_iter();
        while let Some(mention) = remaining.next() {
            match self.classify_one(&mention, conversations).await {
                Ok(Classification::Ignore(reason)) => {
                    debug!(id = %mention.id, reason = ?reason, "Ignoring mention");
                    processed.insert(mention.id.clone());
                }
                Ok(kind) => batch.actions.push(ClassifiedAction { mention, kind }),
                Err(e) if is_permanent(&e) => {
                    warn!(id = %mention.id, error = %e, "Failed to classify mention, skipping");
                    processed.insert(mention.id.clone());
                }
                Err(e) => {
                    warn!(id = %mention.id, error = %e, "Failed to classify mention, retrying next cycle");
                    backlog.push(mention);
                    backlog.extend(remaining);
                    batch.interrupted = Some(e);
                    break;
                }
            }
        }

        Ok(batch)
    }

    async fn classify_one(
        &self,
        mention: &Mention,
        conversations: &ConversationStore,
    ) -> Result<Classification, SocialError> {
        let conversation = mention
            .parent_id
            .as_ref()
            .and_then(|parent| conversations.resolve(parent))
            .cloned();

        let space_url = if contains_trigger(&mention.text, &self.trigger) {
            match space_url_in(self.api.as_ref(), mention).await {
                Some(url) => Some(url),
                None => match &mention.parent_id {
                    Some(parent_id) => {
                        let parent = self.api.lookup_mention(parent_id).await?;
                        space_url_in(self.api.as_ref(), &parent).await
                    }
                    None => None,
                },
            }
        } else {
            None
        };

        Ok(classify(
            mention,
            &self.bot_handle,
            &self.trigger,
            space_url.as_deref(),
            conversation.as_ref(),
        ))
    }
}

/// Builds the search query for mentions of any of `accounts`.
pub fn mention_query(accounts: &[String]) -> String {
    let handles: Vec<String> = accounts
        .iter()
        .map(|a| format!("@{}", a.trim_start_matches('@')))
        .collect();
    match handles.as_slice() {
        [single] => format!("{} -is:retweet", single),
        _ => format!("({}) -is:retweet", handles.join(" OR ")),
    }
}

/// Errors that will not go away by asking again.
fn is_permanent(e: &SocialError) -> bool {
    match e {
        SocialError::NotFound(_) | SocialError::Forbidden(_) | SocialError::Parse(_) => true,
        SocialError::Api { status, .. } => *status < 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_for_single_account() {
        assert_eq!(mention_query(&["ScribeBot".to_string()]), "@ScribeBot -is:retweet");
        assert_eq!(mention_query(&["@ScribeBot".to_string()]), "@ScribeBot -is:retweet");
    }

    #[test]
    fn test_query_for_several_accounts() {
        let accounts = vec!["ScribeBot".to_string(), "@SpacesDaily".to_string()];
        assert_eq!(
            mention_query(&accounts),
            "(@ScribeBot OR @SpacesDaily) -is:retweet"
        );
    }

    #[test]
    fn test_permanent_errors() {
        assert!(is_permanent(&SocialError::NotFound("post 1".into())));
        assert!(is_permanent(&SocialError::Forbidden("protected".into())));
        assert!(is_permanent(&SocialError::Parse("bad json".into())));
        assert!(is_permanent(&SocialError::Api { status: 400, message: String::new() }));
        assert!(!is_permanent(&SocialError::RateLimited { reset_at: None }));
        assert!(!is_permanent(&SocialError::Network("reset".into())));
        assert!(!is_permanent(&SocialError::Api { status: 503, message: String::new() }));
        assert!(!is_permanent(&SocialError::Unauthorized("expired".into())));
    }
}
