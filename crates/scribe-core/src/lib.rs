//! Scribe Core - settings, prompts and summary generation.
//!
//! - **config**: state directory layout
//! - **settings**: immutable startup settings read from the environment
//! - **prompts**: prompt templates and fixed reply texts
//! - **text**: trigger matching and platform length limits
//! - **summary**: the `SummaryEngine` seam and its error type
//! - **gemini**: `SummaryEngine` backed by the Gemini API

pub mod config;
pub mod gemini;
pub mod prompts;
pub mod settings;
pub mod summary;
pub mod text;

pub use config::{config_dir, env_file, state_dir, StatePaths};
pub use gemini::GeminiEngine;
pub use settings::{
    AudioSettings, ConfigError, GeminiSettings, Settings, SupervisorSettings, TelegramSettings,
    TwitterSettings, XCredentials,
};
pub use summary::{Answer, AnswerContext, GenerationError, Summary, SummaryEngine};
pub use text::{contains_trigger, fit_to_limit};
