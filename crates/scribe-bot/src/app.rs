//! Wiring settings into a supervisor.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use scribe_audio::SpaceDownloader;
use scribe_core::{ConfigError, GeminiEngine, GenerationError, Settings};
use scribe_persistence::{NotificationQueue, ProcessedSet};
use scribe_runtime::{BotSupervisor, Integration, RateLimiter, RuntimeError, SupervisorConfig};
use scribe_telegram::{TelegramRelay, TeloxideSender};
use scribe_twitter::{BotConfig, BotState, SocialError, SummaryBot, XClient};

/// Errors that stop Scribe before any integration runs.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The state directory could not be prepared.
    #[error("state directory error: {0}")]
    StateDir(#[from] std::io::Error),

    /// The X client could not be built.
    #[error("X client error: {0}")]
    Social(#[from] SocialError),

    /// The Gemini client could not be built.
    #[error("Gemini client error: {0}")]
    Gemini(#[from] GenerationError),

    /// The supervisor rejected an integration.
    #[error("supervisor error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Builds a supervisor with every enabled integration registered.
pub fn build_supervisor(settings: &Settings) -> Result<BotSupervisor, StartupError> {
    if !settings.has_integrations() {
        return Err(ConfigError::NoIntegrations.into());
    }
    settings.paths.ensure_all()?;

    let config = SupervisorConfig::new()
        .with_max_restarts(settings.supervisor.max_restarts)
        .with_shutdown_grace(settings.supervisor.shutdown_grace);
    let mut supervisor = BotSupervisor::new(config);
    let notifications = NotificationQueue::new(settings.paths.notifications_file());

    if let (Some(twitter), Some(gemini)) = (&settings.twitter, &settings.gemini) {
        let bot_config = BotConfig::from_settings(&settings.trigger_phrase, twitter);
        let api = Arc::new(XClient::new(&twitter.credentials)?);
        let engine = Arc::new(GeminiEngine::new(gemini, twitter.max_post_chars)?);
        let fetcher = Arc::new(SpaceDownloader::from_settings(
            &settings.audio,
            settings.paths.audio_dir(),
        ));
        if !fetcher.is_available() {
            warn!(tool = %settings.audio.tool_path, "Space download tool not found; summaries will fail until it is installed");
        }

        let processed = ProcessedSet::load(settings.paths.processed_file(&bot_config.name));
        let limiter = RateLimiter::new(twitter.min_post_interval, twitter.max_pending_posts);
        let mut state = BotState::new(processed, limiter);
        if settings.telegram.is_some() {
            state = state.with_notifications(notifications.clone());
        }
        let state = Arc::new(state);

        info!(
            handle = %bot_config.bot_handle,
            accounts = ?bot_config.accounts,
            trigger = %bot_config.trigger,
            "Registering X summary bot"
        );
        let name = bot_config.name.clone();
        supervisor.register(name, move || {
            let bot = SummaryBot::new(
                bot_config.clone(),
                api.clone(),
                fetcher.clone(),
                engine.clone(),
                state.clone(),
            );
            Ok(Box::new(bot) as Box<dyn Integration>)
        })?;
    }

    if let Some(telegram) = &settings.telegram {
        if telegram.allowed_users.is_empty() {
            warn!("TELEGRAM_ALLOWED_USERS is empty; notifications will be dropped");
        }
        let sender = Arc::new(TeloxideSender::new(&telegram.token));
        let telegram = telegram.clone();

        info!(users = telegram.allowed_users.len(), "Registering Telegram relay");
        supervisor.register(scribe_telegram::CHANNEL, move || {
            let relay = TelegramRelay::from_settings(sender.clone(), notifications.clone(), &telegram);
            Ok(Box::new(relay) as Box<dyn Integration>)
        })?;
    }

    Ok(supervisor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_telegram_only_supervisor() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&[
            ("ENABLE_TWITTER", "false"),
            ("ENABLE_TELEGRAM", "true"),
            ("TELEGRAM_API_TOKEN", "123:abc"),
            ("TELEGRAM_ALLOWED_USERS", "11,22"),
        ])
        .with_state_dir(dir.path());

        let supervisor = build_supervisor(&settings).unwrap();

        assert!(dir.path().join("state").is_dir());
        drop(supervisor);
    }

    #[test]
    fn test_no_integrations_is_config_error() {
        let settings = settings(&[
            ("ENABLE_TWITTER", "false"),
            ("ENABLE_TELEGRAM", "true"),
            ("TELEGRAM_API_TOKEN", "123:abc"),
        ])
        .without_telegram();

        assert!(matches!(
            build_supervisor(&settings),
            Err(StartupError::Config(ConfigError::NoIntegrations))
        ));
    }
}
