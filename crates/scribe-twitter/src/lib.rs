//! X (Twitter) integration for Scribe.
//!
//! - **client**: the [`SocialApi`] seam and the X API v2 client
//! - **oauth**: OAuth 1.0a request signing for replies
//! - **resolve**: finding the Space a mention points at
//! - **classify**: deciding what a mention asks for
//! - **poller**: fetching, deduplicating and classifying mentions
//! - **conversation**: summaries kept for follow-up questions
//! - **bot**: the [`SummaryBot`] integration run by the supervisor

pub mod bot;
pub mod classify;
pub mod client;
pub mod conversation;
pub mod error;
pub mod oauth;
pub mod poller;
pub mod resolve;

pub use bot::{BotConfig, BotState, SummaryBot};
pub use classify::{classify, ClassifiedAction, Classification, IgnoreReason};
pub use client::{Since, SocialApi, XClient};
pub use conversation::ConversationStore;
pub use error::{Result, SocialError};
pub use poller::{mention_query, MentionPoller, PollBatch};
