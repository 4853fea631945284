//! The generative model and file staging service the pipeline talks to.
//!
//! Both are external collaborators, expressed as traits so the pipeline can
//! be driven by any backend:
//!
//! ```text
//!                 ┌── GeminiBackend     native Files API + generateContent
//! ModelBackend ───┼── ProviderBackend   any edgequake-llm chat provider
//!                 └── ScriptedModel     deterministic, in-process
//! ```
//!
//! A request is an ordered list of [`ContentPart`]s: prompt text, plus
//! staged files (the paper, candidate figures) referenced by handle.

pub mod gemini;
pub mod provider;
pub mod scripted;

pub use gemini::GeminiBackend;
pub use provider::ProviderBackend;
pub use scripted::ScriptedModel;

use crate::config::PipelineConfig;
use crate::error::{ModelError, Paper2PostError};
use async_trait::async_trait;
use edgequake_llm::ProviderFactory;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default model for the native Gemini backend.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default model for chat providers resolved by name.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-mini";

/// A file handed to the staging service, referenced in later requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// Handle used to delete the file, e.g. `files/abc123`.
    pub name: String,
    /// URI used to reference the file in a generation request.
    pub uri: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// One part of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    File(StagedFile),
}

impl ContentPart {
    pub fn text(s: impl Into<String>) -> Self {
        ContentPart::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(s) => Some(s),
            ContentPart::File(_) => None,
        }
    }
}

/// Produces text from an ordered list of content parts.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, ModelError>;
}

/// Stages local files so generation requests can reference them.
#[async_trait]
pub trait FileStager: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<StagedFile, ModelError>;
    async fn delete(&self, name: &str) -> Result<(), ModelError>;
}

/// A backend offering both capabilities.
pub trait ModelBackend: GenerativeModel + FileStager {}

impl<T: GenerativeModel + FileStager> ModelBackend for T {}

/// Guess a MIME type from the file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Delay before retry `attempt` (1-based): `base_ms` doubled per attempt,
/// saturating at `u64::MAX` milliseconds.
pub(crate) fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Resolve the model backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`): used as-is.
/// 2. **Named provider** (`config.provider_name`): `"gemini"` selects the
///    native Gemini backend; any other name goes through
///    [`ProviderFactory::create_llm_provider`].
/// 3. **Gemini key**: `config.api_key` or `GEMINI_API_KEY` selects the
///    native Gemini backend.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Failing all of these is a configuration error, raised before any
/// upload or generation call.
pub fn resolve_backend(config: &PipelineConfig) -> Result<Arc<dyn ModelBackend>, Paper2PostError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        if name.eq_ignore_ascii_case("gemini") {
            return gemini_backend(config);
        }
        let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
        return named_provider(name, model, config);
    }

    if gemini_key(config).is_some() {
        return gemini_backend(config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return named_provider(&prov, &model, config);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Paper2PostError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No model provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY, …).\n\
                Error: {}",
                e
            ),
        })?;
    info!("Using provider auto-detected from environment");
    Ok(Arc::new(ProviderBackend::new(llm_provider, config)))
}

fn gemini_key(config: &PipelineConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|k| !k.is_empty())
}

fn gemini_backend(config: &PipelineConfig) -> Result<Arc<dyn ModelBackend>, Paper2PostError> {
    let key = gemini_key(config).ok_or_else(|| Paper2PostError::ProviderNotConfigured {
        provider: "gemini".to_string(),
        hint: "Set GEMINI_API_KEY or pass an API key.".to_string(),
    })?;
    let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
    info!("Using Gemini model '{}'", model);
    let backend = GeminiBackend::new(key, model, config)?;
    Ok(Arc::new(backend))
}

fn named_provider(
    name: &str,
    model: &str,
    config: &PipelineConfig,
) -> Result<Arc<dyn ModelBackend>, Paper2PostError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        Paper2PostError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using provider '{}' with model '{}'", name, model);
    Ok(Arc::new(ProviderBackend::new(provider, config)))
}
