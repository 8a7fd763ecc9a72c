//! Summary engine backed by the Gemini API.
//!
//! Audio is uploaded once through the Files API. The returned file URI is
//! kept in the [`AudioReference`] so follow-up questions reference the
//! same upload instead of sending the recording again.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use scribe_models::{AudioArtifact, AudioReference};

use crate::prompts;
use crate::settings::GeminiSettings;
use crate::summary::{Answer, AnswerContext, GenerationError, Result, Summary, SummaryEngine};

/// Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Finish reasons that mean the output was withheld.
const BLOCKING_FINISH_REASONS: &[&str] =
    &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII", "RECITATION"];

/// How often an uploaded file is checked while it is being processed.
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Gemini-backed [`SummaryEngine`].
pub struct GeminiEngine {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_chars: usize,
    processing_timeout: Duration,
}

impl GeminiEngine {
    /// Creates an engine whose output targets `max_chars` characters.
    pub fn new(settings: &GeminiSettings, max_chars: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_chars,
            processing_timeout: settings.timeout,
        })
    }

    /// Points the engine at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Uploads a local audio file and waits until it can be referenced.
    async fn upload(&self, path: &std::path::Path, mime_type: &str) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GenerationError::Upload(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), size = bytes.len(), "Uploading audio to Gemini");

        let url = format!("{}/upload/v1beta/files", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let body = read_json(response).await.map_err(|e| match e {
            GenerationError::Api { status, message } => {
                GenerationError::Upload(format!("status {}: {}", status, message))
            }
            other => other,
        })?;

        let file = &body["file"];
        let name = file["name"]
            .as_str()
            .ok_or_else(|| GenerationError::Upload("response has no file name".to_string()))?;
        let uri = file["uri"]
            .as_str()
            .ok_or_else(|| GenerationError::Upload("response has no file uri".to_string()))?
            .to_string();

        if file["state"].as_str() != Some("ACTIVE") {
            self.wait_until_active(name).await?;
        }

        debug!(uri = %uri, "Audio upload ready");
        Ok(uri)
    }

    async fn wait_until_active(&self, name: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.base_url, name);
        let deadline = tokio::time::Instant::now() + self.processing_timeout;

        loop {
            let response = self
                .client
                .get(&url)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| GenerationError::Network(e.to_string()))?;
            let body = read_json(response).await?;

            match body["state"].as_str() {
                Some("ACTIVE") => return Ok(()),
                Some("FAILED") => {
                    return Err(GenerationError::Upload(format!("processing of {} failed", name)))
                }
                _ => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(GenerationError::Upload(format!(
                    "{} still processing after {:?}",
                    name, self.processing_timeout
                )));
            }
            tokio::time::sleep(FILE_POLL_INTERVAL).await;
        }
    }

    async fn generate(&self, prompt: &str, audio: &AudioReference, uri: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": prompt},
                    {"file_data": {"mime_type": audio.mime_type, "file_uri": uri}}
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let body = read_json(response).await?;
        extract_text(&body)
    }

    /// Generates against a reference, uploading the local copy if needed.
    ///
    /// Returns the text and the URI that was used.
    async fn generate_with_audio(
        &self,
        prompt: &str,
        audio: &AudioReference,
    ) -> Result<(String, String)> {
        if let Some(uri) = audio.remote_uri.as_deref() {
            match self.generate(prompt, audio, uri).await {
                Ok(text) => return Ok((text, uri.to_string())),
                // Uploaded files expire; fall back to the local copy.
                Err(GenerationError::Api { status, .. })
                    if matches!(status, 403 | 404) && audio.local_path.exists() =>
                {
                    warn!(uri = %uri, status, "Remote audio unavailable, uploading again");
                }
                Err(e) => return Err(e),
            }
        }

        let uri = self.upload(&audio.local_path, &audio.mime_type).await?;
        let text = self.generate(prompt, audio, &uri).await?;
        Ok((text, uri))
    }
}

#[async_trait]
impl SummaryEngine for GeminiEngine {
    async fn summarize(&self, audio: &AudioArtifact) -> Result<Summary> {
        let reference = AudioReference::local(audio);
        let prompt = prompts::summary_prompt(self.max_chars);
        let (text, uri) = self.generate_with_audio(&prompt, &reference).await?;

        Ok(Summary {
            text,
            audio: reference.with_remote_uri(uri),
        })
    }

    async fn answer(&self, question: &str, context: AnswerContext<'_>) -> Result<Answer> {
        let prompt = prompts::follow_up_prompt(context.summary, question, self.max_chars);
        let (text, uri) = self.generate_with_audio(&prompt, context.audio).await?;
        Ok(Answer {
            text,
            audio: context.audio.clone().with_remote_uri(uri),
        })
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(GenerationError::QuotaExceeded);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GenerationError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| GenerationError::Network(e.to_string()))
}

/// Pulls the generated text out of a `generateContent` response.
///
/// Blocked prompts and withheld candidates map to
/// [`GenerationError::ContentBlocked`].
pub fn extract_text(body: &Value) -> Result<String> {
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(GenerationError::ContentBlocked(reason.to_string()));
    }

    let candidate = &body["candidates"][0];
    if candidate.is_null() {
        return Err(GenerationError::EmptyResponse);
    }

    if let Some(reason) = candidate["finishReason"].as_str() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(GenerationError::ContentBlocked(reason.to_string()));
        }
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_parts() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"text": "The Space covered "}, {"text": "rollups. "}]},
                "finishReason": "STOP"
            }]
        });

        assert_eq!(extract_text(&body).unwrap(), "The Space covered rollups.");
    }

    #[test]
    fn test_prompt_block_reason() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_text(&body).unwrap_err();
        assert!(matches!(err, GenerationError::ContentBlocked(r) if r == "SAFETY"));
    }

    #[test]
    fn test_candidate_finish_reason_blocked() {
        let body = json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "PROHIBITED_CONTENT"}]
        });
        assert!(matches!(
            extract_text(&body).unwrap_err(),
            GenerationError::ContentBlocked(_)
        ));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(matches!(
            extract_text(&json!({"candidates": []})).unwrap_err(),
            GenerationError::EmptyResponse
        ));
        let blank = json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]});
        assert!(matches!(
            extract_text(&blank).unwrap_err(),
            GenerationError::EmptyResponse
        ));
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let settings = GeminiSettings {
            api_key: "k".into(),
            model: "m".into(),
            timeout: Duration::from_secs(5),
        };
        let engine = GeminiEngine::new(&settings, 280)
            .unwrap()
            .with_base_url("http://localhost:9000/");
        assert_eq!(engine.base_url, "http://localhost:9000");
    }
}
