//! Native Gemini backend: Files API staging + `generateContent`.
//!
//! Gemini can read a whole PDF when it is staged through the Files API and
//! referenced by URI, so the paper itself (not a rasterised copy) is what the
//! model sees. Staging uses the two-step resumable protocol: a `start`
//! request returns an upload URL, a single `upload, finalize` request sends
//! the bytes.

use super::{mime_type_for, retry_delay, ContentPart, FileStager, GenerativeModel, StagedFile};
use crate::config::PipelineConfig;
use crate::error::{ModelError, Paper2PostError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client implementing [`GenerativeModel`] and [`FileStager`].
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        config: &PipelineConfig,
    ) -> Result<Self, Paper2PostError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Paper2PostError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn transport(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout {
                secs: self.api_timeout_secs,
            }
        } else {
            ModelError::Request(e.to_string())
        }
    }

    async fn generate_once(&self, url: &str, body: &GenerateRequest<'_>) -> Result<String, ModelError> {
        let resp = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let resp = check_status(resp).await?;
        let parsed: GenerateResponse = resp.json().await.map_err(|e| self.transport(e))?;
        response_text(parsed)
    }
}

#[async_trait]
impl GenerativeModel for GeminiBackend {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, ModelError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = build_request(parts, self.temperature, self.max_tokens);
        let mut last_err = ModelError::EmptyResponse;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = retry_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Retry {}/{} after {}ms",
                    attempt,
                    self.max_retries,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }

            match self.generate_once(&url, &body).await {
                Ok(text) => {
                    debug!("Gemini returned {} chars", text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl FileStager for GeminiBackend {
    async fn upload(&self, path: &Path) -> Result<StagedFile, ModelError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mime = mime_type_for(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ModelError::Request("upload URL missing from start response".into()))?;

        let resp = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let resp = check_status(resp).await?;
        let uploaded: UploadResponse = resp.json().await.map_err(|e| self.transport(e))?;

        debug!(
            "Staged {} as {} ({} bytes)",
            display_name, uploaded.file.name, uploaded.file.size_bytes
        );
        Ok(uploaded.file.into())
    }

    async fn delete(&self, name: &str) -> Result<(), ModelError> {
        let resp = self
            .client
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ModelError::Api {
        status: status.as_u16(),
        message,
    })
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: String,
    /// int64 fields arrive as JSON strings.
    #[serde(default)]
    size_bytes: String,
}

impl From<FileResource> for StagedFile {
    fn from(f: FileResource) -> Self {
        StagedFile {
            name: f.name,
            uri: f.uri,
            mime_type: f.mime_type,
            size_bytes: f.size_bytes.parse().unwrap_or(0),
        }
    }
}

fn build_request(parts: &[ContentPart], temperature: f32, max_tokens: usize) -> GenerateRequest<'_> {
    let parts = parts
        .iter()
        .map(|p| match p {
            ContentPart::Text(text) => RequestPart::Text { text },
            ContentPart::File(f) => RequestPart::File {
                file_data: FileData {
                    mime_type: &f.mime_type,
                    file_uri: &f.uri,
                },
            },
        })
        .collect();

    GenerateRequest {
        contents: vec![RequestContent { role: "user", parts }],
        generation_config: GenerationConfig {
            temperature,
            max_output_tokens: max_tokens,
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(resp: GenerateResponse) -> Result<String, ModelError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(ModelError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_pdf() -> StagedFile {
        StagedFile {
            name: "files/abc".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc".into(),
            mime_type: "application/pdf".into(),
            size_bytes: 1024,
        }
    }

    #[test]
    fn request_keeps_part_order_and_file_references() {
        let parts = vec![ContentPart::text("Summarize:"), ContentPart::File(staged_pdf())];
        let json = serde_json::to_value(build_request(&parts, 0.7, 8192)).unwrap();

        let wire_parts = &json["contents"][0]["parts"];
        assert_eq!(wire_parts[0]["text"], "Summarize:");
        assert_eq!(wire_parts[1]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(
            wire_parts[1]["fileData"]["fileUri"],
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn response_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(resp).unwrap(), "Hello, world");
    }

    #[test]
    fn blocked_response_is_empty() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(response_text(resp), Err(ModelError::EmptyResponse)));
    }

    #[test]
    fn upload_response_maps_to_staged_file() {
        let resp: UploadResponse = serde_json::from_str(
            r#"{"file":{"name":"files/xyz","uri":"https://example/files/xyz","mimeType":"image/png","sizeBytes":"2048"}}"#,
        )
        .unwrap();
        let staged: StagedFile = resp.file.into();
        assert_eq!(staged.name, "files/xyz");
        assert_eq!(staged.size_bytes, 2048);
        assert_eq!(staged.mime_type, "image/png");
    }
}
