//! Audio artifacts produced by the download tool.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default MIME type of downloaded Space recordings.
pub const DEFAULT_AUDIO_MIME: &str = "audio/mp4";

/// A downloaded audio file on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Path to the downloaded file.
    pub path: PathBuf,
    /// The Space URL the file was downloaded from.
    pub source_url: String,
    /// MIME type of the file.
    pub mime_type: String,
}

impl AudioArtifact {
    /// Creates an artifact, inferring the MIME type from the extension.
    pub fn new(path: impl Into<PathBuf>, source_url: impl Into<String>) -> Self {
        let path = path.into();
        let mime_type = mime_for_path(&path).to_string();
        Self {
            path,
            source_url: source_url.into(),
            mime_type,
        }
    }
}

/// Reference to audio that a conversation can be answered from.
///
/// `remote_uri` is set once the AI service has ingested the file, so
/// follow-up questions reuse the upload instead of sending it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioReference {
    /// Local copy of the audio.
    pub local_path: PathBuf,
    /// Handle returned by the AI service for the uploaded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_uri: Option<String>,
    /// MIME type of the audio.
    pub mime_type: String,
}

impl AudioReference {
    /// Creates a reference to a local artifact that has not been uploaded.
    pub fn local(artifact: &AudioArtifact) -> Self {
        Self {
            local_path: artifact.path.clone(),
            remote_uri: None,
            mime_type: artifact.mime_type.clone(),
        }
    }

    /// Attaches the remote handle of an uploaded copy.
    pub fn with_remote_uri(mut self, uri: impl Into<String>) -> Self {
        self.remote_uri = Some(uri.into());
        self
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("aac") => "audio/aac",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => DEFAULT_AUDIO_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_inference() {
        let m4a = AudioArtifact::new("/tmp/space.m4a", "https://x.com/i/spaces/1");
        assert_eq!(m4a.mime_type, "audio/mp4");

        let mp3 = AudioArtifact::new("/tmp/space.MP3", "https://x.com/i/spaces/1");
        assert_eq!(mp3.mime_type, "audio/mpeg");
    }

    #[test]
    fn test_reference_from_artifact() {
        let artifact = AudioArtifact::new("/tmp/space.m4a", "https://x.com/i/spaces/1");
        let reference = AudioReference::local(&artifact).with_remote_uri("files/abc");

        assert_eq!(reference.local_path, PathBuf::from("/tmp/space.m4a"));
        assert_eq!(reference.remote_uri.as_deref(), Some("files/abc"));
    }
}
