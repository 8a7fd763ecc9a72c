//! Startup settings.
//!
//! Settings are read once from the environment (after `.env` files have
//! been loaded by the binary) and handed to the rest of the system as an
//! immutable value. Nothing re-reads the environment afterwards.
//!
//! # Environment Variables
//!
//! General:
//! - `SCRIBE_TRIGGER_PHRASE`: phrase that requests a summary (default: `summarize`)
//! - `ENABLE_TWITTER` / `ENABLE_TELEGRAM`: integration flags (default: true / false)
//! - `SCRIBE_MAX_RESTARTS`: restart budget per integration (default: 5)
//! - `SCRIBE_SHUTDOWN_GRACE_SECS`: grace period for in-flight work (default: 10)
//!
//! X / Twitter (required when enabled):
//! - `X_BOT_HANDLE`, `X_BEARER_TOKEN`, `X_API_KEY`, `X_API_KEY_SECRET`,
//!   `X_ACCESS_TOKEN`, `X_ACCESS_TOKEN_SECRET`
//! - `X_ACCOUNTS_TO_MONITOR`: comma-separated handles whose mentions are
//!   searched (default: the bot handle)
//! - `X_POLL_INTERVAL_SECS` (default: 30), `X_MIN_POST_INTERVAL_SECS` (default: 900),
//!   `X_MAX_PENDING_POSTS` (default: 3), `X_LOOKBACK_SECS` (default: 900),
//!   `X_MAX_POST_CHARS` (default: 280)
//!
//! Audio:
//! - `COOKIE_PATH` (default: `./cookies.txt`), `TWSPACE_DL_PATH` (default: `twspace_dl`),
//!   `AUDIO_DOWNLOAD_TIMEOUT_SECS` (default: 1800)
//!
//! Gemini:
//! - `GEMINI_API_KEY` (required when X is enabled), `GEMINI_MODEL`
//!   (default: `gemini-2.0-flash`), `GEMINI_TIMEOUT_SECS` (default: 300)
//!
//! Telegram (required when enabled):
//! - `TELEGRAM_API_TOKEN`, `TELEGRAM_ALLOWED_USERS` (comma-separated ids),
//!   `TELEGRAM_POLL_INTERVAL_SECS` (default: 5)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::StatePaths;

/// Default trigger phrase.
pub const DEFAULT_TRIGGER_PHRASE: &str = "summarize";

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Errors raised while reading settings. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is missing or empty.
    #[error("required setting {0} is not set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Every integration is disabled.
    #[error("no integration is enabled; set ENABLE_TWITTER or ENABLE_TELEGRAM")]
    NoIntegrations,
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// X API credentials.
#[derive(Clone)]
pub struct XCredentials {
    /// App-only bearer token used for reads.
    pub bearer_token: String,
    /// OAuth 1.0a consumer key.
    pub api_key: String,
    /// OAuth 1.0a consumer secret.
    pub api_secret: String,
    /// OAuth 1.0a access token.
    pub access_token: String,
    /// OAuth 1.0a access token secret.
    pub access_secret: String,
}

impl std::fmt::Debug for XCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XCredentials")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Settings for the X summary bot.
#[derive(Debug, Clone)]
pub struct TwitterSettings {
    /// Bot handle without the leading `@`.
    pub bot_handle: String,
    /// Handles whose mentions are searched, without the leading `@`.
    pub accounts: Vec<String>,
    /// API credentials.
    pub credentials: XCredentials,
    /// Delay between poll cycles.
    pub poll_interval: Duration,
    /// Minimum spacing between posted replies.
    pub min_post_interval: Duration,
    /// Reservations allowed ahead of time before replies are deferred.
    pub max_pending_posts: usize,
    /// Search window used when no cursor is known yet.
    pub lookback: Duration,
    /// Maximum characters of a single post.
    pub max_post_chars: usize,
}

/// Settings for the audio download tool.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Download tool binary.
    pub tool_path: String,
    /// Cookie file passed to the tool.
    pub cookie_path: PathBuf,
    /// Upper bound for one download.
    pub timeout: Duration,
}

/// Settings for the Gemini summary engine.
#[derive(Clone)]
pub struct GeminiSettings {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Settings for the Telegram notification relay.
#[derive(Clone)]
pub struct TelegramSettings {
    /// Bot token.
    pub token: String,
    /// Chats that receive notifications.
    pub allowed_users: Vec<i64>,
    /// Delay between relay cycles.
    pub poll_interval: Duration,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("allowed_users", &self.allowed_users)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Consecutive restarts allowed before an integration is failed.
    pub max_restarts: u32,
    /// Time in-flight work gets to finish on shutdown.
    pub shutdown_grace: Duration,
}

/// Immutable startup settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where state files live.
    pub paths: StatePaths,
    /// Phrase that requests a summary.
    pub trigger_phrase: String,
    /// X bot settings, present when the integration is enabled.
    pub twitter: Option<TwitterSettings>,
    /// Audio download settings.
    pub audio: AudioSettings,
    /// Gemini settings, present when the X bot is enabled.
    pub gemini: Option<GeminiSettings>,
    /// Telegram settings, present when the integration is enabled.
    pub telegram: Option<TelegramSettings>,
    /// Supervisor settings.
    pub supervisor: SupervisorSettings,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through a lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let paths = env
            .optional(crate::config::STATE_DIR_ENV)
            .map(StatePaths::new)
            .unwrap_or_default();

        let trigger_phrase = env
            .optional("SCRIBE_TRIGGER_PHRASE")
            .unwrap_or_else(|| DEFAULT_TRIGGER_PHRASE.to_string());

        let enable_twitter = env.flag("ENABLE_TWITTER", true)?;
        let enable_telegram = env.flag("ENABLE_TELEGRAM", false)?;
        if !enable_twitter && !enable_telegram {
            return Err(ConfigError::NoIntegrations);
        }

        let twitter = if enable_twitter {
            let bot_handle = env
                .required("X_BOT_HANDLE")?
                .trim_start_matches('@')
                .to_string();
            let mut accounts = parse_handles(&env.optional("X_ACCOUNTS_TO_MONITOR").unwrap_or_default());
            if accounts.is_empty() {
                accounts.push(bot_handle.clone());
            }
            Some(TwitterSettings {
                bot_handle,
                accounts,
                credentials: XCredentials {
                    bearer_token: env.required("X_BEARER_TOKEN")?,
                    api_key: env.required("X_API_KEY")?,
                    api_secret: env.required("X_API_KEY_SECRET")?,
                    access_token: env.required("X_ACCESS_TOKEN")?,
                    access_secret: env.required("X_ACCESS_TOKEN_SECRET")?,
                },
                poll_interval: env.secs("X_POLL_INTERVAL_SECS", 30)?,
                min_post_interval: env.secs("X_MIN_POST_INTERVAL_SECS", 900)?,
                max_pending_posts: env.number("X_MAX_PENDING_POSTS", 3)?,
                lookback: env.secs("X_LOOKBACK_SECS", 900)?,
                max_post_chars: env.number("X_MAX_POST_CHARS", 280)?,
            })
        } else {
            None
        };

        let gemini = if enable_twitter {
            Some(GeminiSettings {
                api_key: env.required("GEMINI_API_KEY")?,
                model: env
                    .optional("GEMINI_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                timeout: env.secs("GEMINI_TIMEOUT_SECS", 300)?,
            })
        } else {
            None
        };

        let cookie_path = env
            .optional("COOKIE_PATH")
            .unwrap_or_else(|| "./cookies.txt".to_string());
        let audio = AudioSettings {
            tool_path: env
                .optional("TWSPACE_DL_PATH")
                .unwrap_or_else(|| "twspace_dl".to_string()),
            cookie_path: PathBuf::from(shellexpand::tilde(&cookie_path).into_owned()),
            timeout: env.secs("AUDIO_DOWNLOAD_TIMEOUT_SECS", 30 * 60)?,
        };

        let telegram = if enable_telegram {
            Some(TelegramSettings {
                token: env.required("TELEGRAM_API_TOKEN")?,
                allowed_users: parse_user_ids(&env.optional("TELEGRAM_ALLOWED_USERS").unwrap_or_default()),
                poll_interval: env.secs("TELEGRAM_POLL_INTERVAL_SECS", 5)?,
            })
        } else {
            None
        };

        let supervisor = SupervisorSettings {
            max_restarts: env.number("SCRIBE_MAX_RESTARTS", 5)?,
            shutdown_grace: env.secs("SCRIBE_SHUTDOWN_GRACE_SECS", 10)?,
        };

        Ok(Self {
            paths,
            trigger_phrase,
            twitter,
            audio,
            gemini,
            telegram,
            supervisor,
        })
    }

    /// Returns a copy with the X integration disabled.
    pub fn without_twitter(mut self) -> Self {
        self.twitter = None;
        self.gemini = None;
        self
    }

    /// Returns a copy with the Telegram integration disabled.
    pub fn without_telegram(mut self) -> Self {
        self.telegram = None;
        self
    }

    /// Returns a copy rooted at a different state directory.
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths = StatePaths::new(dir);
        self
    }

    /// Returns true if at least one integration is enabled.
    pub fn has_integrations(&self) -> bool {
        self.twitter.is_some() || self.telegram.is_some()
    }
}

/// Parse a comma-separated list of Telegram user ids.
///
/// Malformed entries are skipped with a warning.
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!(value = %s, "Ignoring invalid Telegram user id");
                None
            }
        })
        .collect()
}

/// Parse a comma-separated list of X handles, dropping `@` and duplicates.
pub fn parse_handles(raw: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for handle in raw.split(',').map(|s| s.trim().trim_start_matches('@')) {
        if !handle.is_empty() && !handles.iter().any(|h| h.eq_ignore_ascii_case(handle)) {
            handles.push(handle.to_string());
        }
    }
    handles
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String> {
        self.optional(var).ok_or(ConfigError::Missing(var))
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool> {
        match self.optional(var) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { var, value: v }),
            },
        }
    }

    fn number<T: std::str::FromStr>(&self, var: &'static str, default: T) -> Result<T> {
        match self.optional(var) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { var, value: v }),
        }
    }

    fn secs(&self, var: &'static str, default: u64) -> Result<Duration> {
        self.number(var, default).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn twitter_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("X_BOT_HANDLE", "@ScribeBot"),
            ("X_BEARER_TOKEN", "bearer"),
            ("X_API_KEY", "key"),
            ("X_API_KEY_SECRET", "secret"),
            ("X_ACCESS_TOKEN", "token"),
            ("X_ACCESS_TOKEN_SECRET", "token-secret"),
            ("GEMINI_API_KEY", "gemini"),
            ("SCRIBE_STATE_DIR", "/tmp/scribe-test"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Settings> {
        Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_with_twitter_credentials() {
        let settings = load(&twitter_env()).unwrap();

        assert_eq!(settings.trigger_phrase, "summarize");
        let twitter = settings.twitter.unwrap();
        assert_eq!(twitter.bot_handle, "ScribeBot");
        assert_eq!(twitter.accounts, vec!["ScribeBot".to_string()]);
        assert_eq!(twitter.poll_interval, Duration::from_secs(30));
        assert_eq!(twitter.min_post_interval, Duration::from_secs(900));
        assert_eq!(twitter.max_pending_posts, 3);
        assert_eq!(twitter.max_post_chars, 280);
        assert_eq!(settings.audio.timeout, Duration::from_secs(1800));
        assert_eq!(settings.gemini.unwrap().model, DEFAULT_GEMINI_MODEL);
        assert!(settings.telegram.is_none());
        assert_eq!(settings.supervisor.max_restarts, 5);
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let mut vars = twitter_env();
        vars.remove("X_API_KEY");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("X_API_KEY")));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = twitter_env();
        vars.insert("GEMINI_API_KEY", "  ");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GEMINI_API_KEY")));
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = twitter_env();
        vars.insert("X_POLL_INTERVAL_SECS", "soon");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "X_POLL_INTERVAL_SECS", .. }));
    }

    #[test]
    fn test_accounts_to_monitor() {
        let mut vars = twitter_env();
        vars.insert("X_ACCOUNTS_TO_MONITOR", "@ScribeBot, @SpacesDaily,,scribebot , AltScribe");

        let twitter = load(&vars).unwrap().twitter.unwrap();
        assert_eq!(twitter.bot_handle, "ScribeBot");
        assert_eq!(twitter.accounts, vec!["ScribeBot", "SpacesDaily", "AltScribe"]);
    }

    #[test]
    fn test_all_disabled() {
        let vars = HashMap::from([("ENABLE_TWITTER", "false")]);
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::NoIntegrations));
    }

    #[test]
    fn test_telegram_only() {
        let vars = HashMap::from([
            ("ENABLE_TWITTER", "no"),
            ("ENABLE_TELEGRAM", "yes"),
            ("TELEGRAM_API_TOKEN", "tg"),
            ("TELEGRAM_ALLOWED_USERS", "1, 2,abc,,3"),
        ]);

        let settings = load(&vars).unwrap();
        assert!(settings.twitter.is_none());
        assert!(settings.gemini.is_none());
        let telegram = settings.telegram.unwrap();
        assert_eq!(telegram.allowed_users, vec![1, 2, 3]);
        assert_eq!(telegram.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides() {
        let settings = load(&twitter_env())
            .unwrap()
            .without_twitter()
            .with_state_dir("/var/lib/scribe");

        assert!(!settings.has_integrations());
        assert_eq!(settings.paths.root(), std::path::Path::new("/var/lib/scribe"));
    }

    #[test]
    fn test_credentials_are_redacted() {
        let settings = load(&twitter_env()).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("token-secret"));
        assert!(!debug.contains("gemini\""));
    }
}
