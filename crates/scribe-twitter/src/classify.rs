//! Mention classification.
//!
//! Classification is a pure function of the mention, what was resolved
//! about it, and the trigger phrase. All I/O (parent lookup, short-link
//! expansion, conversation lookup) happens before it is called.

use scribe_core::contains_trigger;
use scribe_models::{Mention, MentionId};

/// What to do with a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Download and summarize the Space.
    SummarizeRequest {
        /// Space to summarize.
        space_url: String,
    },
    /// Answer a question about an earlier summary.
    FollowUp {
        /// Root mention of the conversation being continued.
        root: MentionId,
    },
    /// Nothing to do.
    Ignore(IgnoreReason),
}

/// Why a mention was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Posted by the bot itself.
    OwnPost,
    /// Asked for a summary but no Space was found.
    NoSpace,
    /// Neither a summary request nor a reply to a known conversation.
    Unrelated,
}

/// A classified mention ready for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAction {
    /// The mention.
    pub mention: Mention,
    /// What to do with it.
    pub kind: Classification,
}

/// Classifies a mention.
///
/// * `space_url` - Space resolved from the mention or its parent
/// * `conversation` - root of the conversation the parent post belongs to
///
/// A summary request takes precedence over a follow-up when the mention
/// both contains the trigger and replies into a known conversation.
pub fn classify(
    mention: &Mention,
    bot_handle: &str,
    trigger: &str,
    space_url: Option<&str>,
    conversation: Option<&MentionId>,
) -> Classification {
    if mention.author.eq_ignore_ascii_case(bot_handle.trim_start_matches('@')) {
        return Classification::Ignore(IgnoreReason::OwnPost);
    }

    let triggered = contains_trigger(&mention.text, trigger);
    if triggered {
        if let Some(url) = space_url {
            return Classification::SummarizeRequest {
                space_url: url.to_string(),
            };
        }
    }

    if let Some(root) = conversation {
        return Classification::FollowUp { root: root.clone() };
    }

    if triggered {
        Classification::Ignore(IgnoreReason::NoSpace)
    } else {
        Classification::Ignore(IgnoreReason::Unrelated)
    }
}

/// Strips the leading `@handle` run from a reply, leaving the question.
pub fn question_text(text: &str) -> &str {
    let mut rest = text.trim_start();
    while let Some(stripped) = rest.strip_prefix('@') {
        let end = stripped
            .find(char::is_whitespace)
            .unwrap_or(stripped.len());
        rest = stripped[end..].trim_start();
    }
    if rest.is_empty() {
        text.trim()
    } else {
        rest.trim_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SPACE: &str = "https://x.com/i/spaces/1vOxwdyYrlqKB";

    fn mention(author: &str, text: &str) -> Mention {
        Mention::new("100", author, text, Utc::now())
    }

    #[test]
    fn test_summarize_request() {
        let m = mention("alice", "@ScribeBot Summarize please");
        assert_eq!(
            classify(&m, "ScribeBot", "summarize", Some(SPACE), None),
            Classification::SummarizeRequest { space_url: SPACE.to_string() }
        );
    }

    #[test]
    fn test_trigger_without_space() {
        let m = mention("alice", "@ScribeBot summarize");
        assert_eq!(
            classify(&m, "ScribeBot", "summarize", None, None),
            Classification::Ignore(IgnoreReason::NoSpace)
        );
    }

    #[test]
    fn test_follow_up() {
        let m = mention("bob", "@ScribeBot who was the second speaker?");
        let root = MentionId::from("90");
        assert_eq!(
            classify(&m, "ScribeBot", "summarize", None, Some(&root)),
            Classification::FollowUp { root }
        );
    }

    #[test]
    fn test_summary_wins_over_follow_up() {
        let m = mention("bob", "@ScribeBot summarize this one too");
        let root = MentionId::from("90");
        assert!(matches!(
            classify(&m, "ScribeBot", "summarize", Some(SPACE), Some(&root)),
            Classification::SummarizeRequest { .. }
        ));
    }

    #[test]
    fn test_unrelated_and_own_posts() {
        let m = mention("carol", "@ScribeBot gm");
        assert_eq!(
            classify(&m, "ScribeBot", "summarize", Some(SPACE), None),
            Classification::Ignore(IgnoreReason::Unrelated)
        );

        let own = mention("scribebot", "summarize");
        assert_eq!(
            classify(&own, "@ScribeBot", "summarize", Some(SPACE), None),
            Classification::Ignore(IgnoreReason::OwnPost)
        );
    }

    #[test]
    fn test_question_text() {
        assert_eq!(question_text("@ScribeBot @alice who spoke first?"), "who spoke first?");
        assert_eq!(question_text("what about @alice?"), "what about @alice?");
        assert_eq!(question_text("@ScribeBot"), "@ScribeBot");
    }
}
