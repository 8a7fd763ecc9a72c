//! Summary generation seam.
//!
//! The bot only talks to [`SummaryEngine`]; the Gemini adapter lives in
//! [`crate::gemini`] and tests use hand-written doubles.

use async_trait::async_trait;
use thiserror::Error;

use scribe_models::{AudioArtifact, AudioReference};

/// Errors from the AI service.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The service refused to process the content.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The service reported quota or rate exhaustion.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The request did not complete.
    #[error("network error: {0}")]
    Network(String),

    /// Uploading the audio failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The service answered without any text.
    #[error("empty response")]
    EmptyResponse,

    /// The service returned an unexpected status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or message.
        message: String,
    },
}

impl GenerationError {
    /// Returns true if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::Network(_))
            || matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// A generated summary and the audio it was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Summary text, not yet fitted to a platform limit.
    pub text: String,
    /// Reference to reuse for follow-up questions.
    pub audio: AudioReference,
}

/// What a follow-up answer is generated from.
#[derive(Debug, Clone, Copy)]
pub struct AnswerContext<'a> {
    /// The previously posted summary.
    pub summary: &'a str,
    /// The audio the summary came from.
    pub audio: &'a AudioReference,
}

/// A follow-up answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Answer text, not yet fitted to a platform limit.
    pub text: String,
    /// The reference the answer was generated from. Differs from the one
    /// passed in when the recording had to be uploaded again.
    pub audio: AudioReference,
}

/// Produces summaries of Space recordings and answers questions about them.
#[async_trait]
pub trait SummaryEngine: Send + Sync {
    /// Summarizes a downloaded recording.
    async fn summarize(&self, audio: &AudioArtifact) -> Result<Summary>;

    /// Answers a question about a previously summarized recording.
    async fn answer(&self, question: &str, context: AnswerContext<'_>) -> Result<Answer>;
}
