//! Prompt templates and fixed reply texts.

/// Prompt used to summarize a Space recording.
pub const SUMMARY_PROMPT: &str = r#"You are Scribe, a bot that summarizes recorded X Spaces.
Listen to the attached recording and write a summary that will be posted as a reply.

Rules:
- Open with one sentence describing what the Space was about
- Follow with the main points, one short line each
- Name speakers only when the recording makes it clear who is talking
- Keep claims faithful to what was said; do not add outside facts
- Plain text only, no markdown headings or links
- Stay under {limit} characters"#;

/// Prompt used to answer a follow-up question about a summarized Space.
pub const FOLLOW_UP_PROMPT: &str = r#"You are Scribe, a bot that answers questions about recorded X Spaces.
You previously posted this summary of the attached recording:

{summary}

A listener replied with this question:

{question}

Answer the question using the recording. If the recording does not cover it, say so briefly.
Plain text only. Stay under {limit} characters."#;

/// Reply sent when the Space audio could not be downloaded.
pub const AUDIO_UNAVAILABLE_REPLY: &str =
    "Sorry, I couldn't retrieve the audio for that Space. It may have been deleted, made private, or was never recorded.";

/// Reply sent when the AI service refused to process the recording.
pub const CONTENT_BLOCKED_REPLY: &str =
    "Sorry, I'm not able to summarize this Space.";

/// Reply sent when repeated attempts to generate text have failed.
pub const FALLBACK_REPLY: &str = "We're experiencing some difficulties.";

/// Builds the summary prompt for a given character limit.
pub fn summary_prompt(limit: usize) -> String {
    SUMMARY_PROMPT.replace("{limit}", &limit.to_string())
}

/// Builds the follow-up prompt.
pub fn follow_up_prompt(summary: &str, question: &str, limit: usize) -> String {
    FOLLOW_UP_PROMPT
        .replace("{summary}", summary)
        .replace("{question}", question)
        .replace("{limit}", &limit.to_string())
}
