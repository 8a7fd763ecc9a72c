//! `twspace_dl` process wrapper.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use scribe_core::AudioSettings;
use scribe_models::AudioArtifact;

use crate::error::{FetchError, Result};
use crate::space_url::space_id;
use crate::AudioFetcher;

/// Default download timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Output name template handed to the tool; it appends the extension.
const OUTPUT_TEMPLATE: &str = "%(id)s";

/// Extensions recognized as downloaded audio.
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp4", "aac", "mp3", "ogg", "wav", "flac"];

/// Lowercased stderr fragments that mean the Space is gone or unreachable.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "does not exist",
    "not available",
    "unavailable",
    "private",
    "deleted",
    "no longer",
    "not recorded",
    "master url",
];

/// Downloads Space recordings by running `twspace_dl`.
///
/// Each download gets its own directory under the output root. The child
/// process is killed if the download exceeds the timeout or the future
/// is dropped.
#[derive(Debug, Clone)]
pub struct SpaceDownloader {
    tool: String,
    cookie_path: PathBuf,
    output_root: PathBuf,
    timeout: Duration,
}

impl SpaceDownloader {
    /// Creates a downloader writing under `output_root`.
    pub fn new(
        tool: impl Into<String>,
        cookie_path: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool: tool.into(),
            cookie_path: cookie_path.into(),
            output_root: output_root.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a downloader from audio settings.
    pub fn from_settings(settings: &AudioSettings, output_root: impl Into<PathBuf>) -> Self {
        Self::new(&settings.tool_path, &settings.cookie_path, output_root)
            .with_timeout(settings.timeout)
    }

    /// Sets the download timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if the tool can be found.
    pub fn is_available(&self) -> bool {
        self.locate_tool().is_ok()
    }

    fn locate_tool(&self) -> Result<PathBuf> {
        which::which(&self.tool)
            .map_err(|_| FetchError::ToolError(format!("{} is not installed", self.tool)))
    }

    fn check_cookies(&self) -> Result<()> {
        if self.cookie_path.is_file() {
            Ok(())
        } else {
            Err(FetchError::ToolError(format!(
                "cookie file {} does not exist",
                self.cookie_path.display()
            )))
        }
    }

    async fn run(&self, tool: &Path, space_url: &str, out_dir: &Path) -> Result<()> {
        let template = out_dir.join(OUTPUT_TEMPLATE);

        let mut cmd = Command::new(tool);
        cmd.arg("-i")
            .arg(space_url)
            .arg("-c")
            .arg(&self.cookie_path)
            .arg("-o")
            .arg(&template)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %tool.display(), url = %space_url, "Spawning download tool");
        let child = cmd.spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(url = %space_url, timeout = ?self.timeout, "Download timed out, killing tool");
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        Err(classify_failure(&stderr, &stdout, output.status.code()))
    }

    async fn download_into(&self, tool: &Path, space_url: &str, out_dir: &Path) -> Result<PathBuf> {
        self.run(tool, space_url, out_dir).await?;
        find_audio_file(out_dir).await?.ok_or_else(|| {
            FetchError::ToolError(format!("no audio file written to {}", out_dir.display()))
        })
    }

    /// The per-download directory holding `audio`, if it is one of ours.
    fn download_dir_of<'a>(&self, audio: &'a Path) -> Option<&'a Path> {
        audio
            .parent()
            .filter(|dir| dir.parent() == Some(self.output_root.as_path()))
    }
}

#[async_trait]
impl AudioFetcher for SpaceDownloader {
    async fn fetch(&self, space_url: &str) -> Result<AudioArtifact> {
        let id = space_id(space_url)?;
        self.check_cookies()?;
        let tool = self.locate_tool()?;

        let out_dir = self
            .output_root
            .join(format!("{}-{}", id, chrono::Utc::now().timestamp_millis()));
        tokio::fs::create_dir_all(&out_dir).await?;

        info!(space = %id, dir = %out_dir.display(), "Downloading Space audio");
        match self.download_into(&tool, space_url, &out_dir).await {
            Ok(path) => {
                info!(space = %id, path = %path.display(), "Space audio downloaded");
                Ok(AudioArtifact::new(path, space_url))
            }
            Err(e) => {
                remove_dir(&out_dir).await;
                Err(e)
            }
        }
    }

    async fn release(&self, audio: &Path) -> Result<()> {
        match self.download_dir_of(audio) {
            Some(dir) => {
                debug!(dir = %dir.display(), "Removing Space audio");
                match tokio::fs::remove_dir_all(dir).await {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                    _ => Ok(()),
                }
            }
            None => match tokio::fs::remove_file(audio).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            },
        }
    }
}

async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Failed to remove download directory");
    }
}

/// Maps a failed tool run to a fetch error.
pub(crate) fn classify_failure(stderr: &str, stdout: &str, code: Option<i32>) -> FetchError {
    let diagnostics = format!("{}\n{}", stderr, stdout).to_lowercase();
    let last_line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string();

    if NOT_FOUND_MARKERS.iter().any(|m| diagnostics.contains(m)) {
        return FetchError::NotFound(last_line);
    }

    match code {
        Some(code) => FetchError::ToolError(format!("exit code {}: {}", code, last_line)),
        None => FetchError::ToolError(format!("terminated by signal: {}", last_line)),
    }
}

/// Picks the largest audio file in `dir`.
async fn find_audio_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best: Option<(u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }
        let size = entry.metadata().await?.len();
        if best.as_ref().map_or(true, |(s, _)| size > *s) {
            best = Some((size, path));
        }
    }

    Ok(best.map(|(_, p)| p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_failure(
            "Traceback...\nRuntimeError: Space is not available\n",
            "",
            Some(1),
        );
        assert!(matches!(err, FetchError::NotFound(msg) if msg.contains("not available")));
    }

    #[test]
    fn test_classify_tool_error() {
        let err = classify_failure("ffmpeg: invalid argument\n", "", Some(2));
        assert!(matches!(err, FetchError::ToolError(msg) if msg.contains("exit code 2")));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_spawn() {
        let downloader = SpaceDownloader::new("/nonexistent/tool", "/nonexistent/cookies", "/tmp");
        let err = downloader.fetch("https://x.com/alice/status/1").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_missing_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = SpaceDownloader::new("sh", dir.path().join("cookies.txt"), dir.path());
        let err = downloader.fetch("https://x.com/i/spaces/1abc").await.unwrap_err();
        assert!(matches!(err, FetchError::ToolError(msg) if msg.contains("cookie")));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = dir.path().join("cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

        let downloader = SpaceDownloader::new("scribe-no-such-tool", &cookies, dir.path());
        assert!(!downloader.is_available());
        let err = downloader.fetch("https://x.com/i/spaces/1abc").await.unwrap_err();
        assert!(matches!(err, FetchError::ToolError(msg) if msg.contains("not installed")));
    }

    #[test]
    fn test_download_dir_must_be_under_output_root() {
        let downloader = SpaceDownloader::new("twspace_dl", "/tmp/cookies.txt", "/srv/audio");
        assert_eq!(
            downloader.download_dir_of(Path::new("/srv/audio/1abc-17/1abc.m4a")),
            Some(Path::new("/srv/audio/1abc-17"))
        );
        assert_eq!(downloader.download_dir_of(Path::new("/srv/audio/1abc.m4a")), None);
        assert_eq!(downloader.download_dir_of(Path::new("/home/alice/talk.m4a")), None);
    }

    #[tokio::test]
    async fn test_find_audio_prefers_largest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.m4a"), b"1").unwrap();
        std::fs::write(dir.path().join("large.m4a"), b"12345").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"1234567890").unwrap();

        let found = find_audio_file(dir.path()).await.unwrap().unwrap();
        assert!(found.ends_with("large.m4a"));
    }
}
