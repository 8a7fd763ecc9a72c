//! Shared configuration paths for Scribe.
//!
//! Provides functions to locate Scribe's state directory and the files
//! kept in it.
//!
//! # Storage Structure
//!
//! All application data is stored under `~/.scribe/`:
//!
//! ```text
//! ~/.scribe/
//! ├── config/       # .env.local with credentials
//! ├── audio/        # Downloaded Space recordings
//! └── state/        # Processed mentions, notification queue
//! ```
//!
//! # Environment Variables
//!
//! - `SCRIBE_STATE_DIR`: Override the base state directory
//! - `SCRIBE_CONFIG_DIR`: Override the config directory

use std::path::{Path, PathBuf};

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "SCRIBE_STATE_DIR";

/// Environment variable for custom config directory.
pub const CONFIG_DIR_ENV: &str = "SCRIBE_CONFIG_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".scribe";

// Subdirectory names
const CONFIG_SUBDIR: &str = "config";
const AUDIO_SUBDIR: &str = "audio";
const STATE_SUBDIR: &str = "state";

/// Get the default Scribe state directory.
///
/// The state directory is determined by:
/// 1. `SCRIBE_STATE_DIR` environment variable if set
/// 2. `~/.scribe` if home directory is available
/// 3. `.scribe` in current directory as fallback
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Get the user config directory.
///
/// Defaults to `~/.scribe/config/` or `SCRIBE_CONFIG_DIR` env var.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the .env.local file path.
///
/// Environment file for secrets (API keys, tokens).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Paths of the files Scribe keeps under one state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Creates the layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The state root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for runtime state files.
    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join(STATE_SUBDIR)
    }

    /// Directory downloaded audio is written to.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_SUBDIR)
    }

    /// File holding processed mention ids for an integration.
    pub fn processed_file(&self, integration: &str) -> PathBuf {
        self.runtime_dir()
            .join(format!("processed-{}.json", integration))
    }

    /// Cross-integration notification queue.
    pub fn notifications_file(&self) -> PathBuf {
        self.runtime_dir().join("notifications.json")
    }

    /// Ensure the state directory and all subdirectories exist.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.runtime_dir())?;
        std::fs::create_dir_all(self.audio_dir())?;
        Ok(())
    }
}

impl Default for StatePaths {
    fn default() -> Self {
        Self::new(state_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_smoke() {
        let dir = state_dir();
        assert!(dir.is_absolute() || dir.ends_with(".scribe") || std::env::var(STATE_DIR_ENV).is_ok());
    }

    #[test]
    fn test_env_file_name() {
        assert!(env_file().ends_with(".env.local"));
    }

    #[test]
    fn test_state_paths_layout() {
        let paths = StatePaths::new("/srv/scribe");

        assert_eq!(paths.runtime_dir(), PathBuf::from("/srv/scribe/state"));
        assert_eq!(paths.audio_dir(), PathBuf::from("/srv/scribe/audio"));
        assert!(paths.processed_file("twitter").ends_with("processed-twitter.json"));
        assert!(paths.notifications_file().ends_with("notifications.json"));
    }

    #[test]
    fn test_ensure_all_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StatePaths::new(dir.path());

        paths.ensure_all().unwrap();

        assert!(paths.runtime_dir().is_dir());
        assert!(paths.audio_dir().is_dir());
    }
}
