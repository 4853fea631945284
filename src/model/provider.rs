//! Chat-provider backend over `edgequake-llm`.
//!
//! Chat providers (OpenAI, Anthropic, Ollama, …) have no file staging
//! service, so staging happens in memory: a staged PDF is rasterised into
//! page images, a staged PNG is base64-encoded as-is. A generation request
//! becomes one user message whose text carries a marker wherever a staged
//! file was referenced, with the file's images attached in the same order.
//!
//! ## Retry Strategy
//!
//! `max_retries` defaults to 0. When raised, failed calls are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`).

use super::{mime_type_for, retry_delay, ContentPart, FileStager, GenerativeModel, StagedFile};
use crate::config::PipelineConfig;
use crate::error::ModelError;
use crate::pdf;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Adapts an [`LLMProvider`] to [`GenerativeModel`] + [`FileStager`].
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    staged: Mutex<HashMap<String, Vec<ImageData>>>,
    next_id: AtomicUsize,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    max_document_pages: usize,
    max_rendered_pixels: u32,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            staged: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
            max_document_pages: config.max_document_pages,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Flatten content parts into one prompt plus its attached images.
    fn build_message(&self, parts: &[ContentPart]) -> Result<ChatMessage, ModelError> {
        let staged = self.staged.lock().unwrap_or_else(|e| e.into_inner());
        let mut text: Vec<String> = Vec::with_capacity(parts.len());
        let mut images: Vec<ImageData> = Vec::new();

        for part in parts {
            match part {
                ContentPart::Text(t) => text.push(t.clone()),
                ContentPart::File(f) => {
                    let file_images = staged
                        .get(&f.name)
                        .ok_or_else(|| ModelError::UnknownFile(f.name.clone()))?;
                    text.push(attachment_marker(images.len(), file_images.len()));
                    images.extend(file_images.iter().cloned());
                }
            }
        }

        let prompt = text.join("\n\n");
        Ok(ChatMessage::user_with_images(&prompt, images))
    }

    async fn stage_images(&self, path: &Path) -> Result<Vec<ImageData>, ModelError> {
        let mime = mime_type_for(path);
        if mime == "application/pdf" {
            let owned = path.to_path_buf();
            let (pages, px) = (self.max_document_pages, self.max_rendered_pixels);
            let rendered = tokio::task::spawn_blocking(move || pdf::rasterise_pages(&owned, pages, px))
                .await
                .map_err(|e| ModelError::Provider(format!("render task panicked: {e}")))?
                .map_err(|e| ModelError::Provider(e.to_string()))?;

            rendered
                .iter()
                .map(|img| {
                    pdf::encode_png(img)
                        .map(|png| to_image_data(&png, "image/png"))
                        .map_err(|e| ModelError::Provider(format!("PNG encoding failed: {e}")))
                })
                .collect()
        } else {
            let bytes = tokio::fs::read(path).await.map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(vec![to_image_data(&bytes, mime)])
        }
    }
}

fn to_image_data(bytes: &[u8], mime: &str) -> ImageData {
    ImageData::new(STANDARD.encode(bytes), mime).with_detail("high")
}

/// Text placed where a staged file was referenced; image numbers are 1-based.
fn attachment_marker(already_attached: usize, count: usize) -> String {
    let first = already_attached + 1;
    match count {
        0 => "[attachment has no images]".to_string(),
        1 => format!("[see attached image {first}]"),
        n => format!("[see attached images {first}-{}]", first + n - 1),
    }
}

#[async_trait]
impl GenerativeModel for ProviderBackend {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, ModelError> {
        let messages = vec![self.build_message(parts)?];
        let options = self.build_options();
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
                sleep(backoff).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    if response.content.trim().is_empty() {
                        last_err = ModelError::EmptyResponse;
                        continue;
                    }
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_err = ModelError::Provider(e.to_string());
                }
                Err(_) => {
                    warn!("Attempt {} timed out", attempt + 1);
                    last_err = ModelError::Timeout {
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl FileStager for ProviderBackend {
    async fn upload(&self, path: &Path) -> Result<StagedFile, ModelError> {
        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let images = self.stage_images(path).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("local/{id}");
        debug!("Staged {} as {} ({} images)", path.display(), name, images.len());
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone(), images);

        Ok(StagedFile {
            name,
            uri: format!("local://{}", path.display()),
            mime_type: mime_type_for(path).to_string(),
            size_bytes,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), ModelError> {
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ModelError::UnknownFile(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_markers_number_images_in_order() {
        assert_eq!(attachment_marker(0, 1), "[see attached image 1]");
        assert_eq!(attachment_marker(1, 12), "[see attached images 2-13]");
        assert_eq!(attachment_marker(3, 0), "[attachment has no images]");
    }

    #[test]
    fn image_data_is_base64_png() {
        let data = to_image_data(b"\x89PNG", "image/png");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), b"\x89PNG");
    }
}
