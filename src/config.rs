//! Configuration types for a paper-to-post run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The model client is never a global: it is
//! either injected through [`PipelineConfigBuilder::backend`] or resolved from
//! these fields once per run by [`crate::model::resolve_backend`].

use crate::error::Paper2PostError;
use crate::model::ModelBackend;
use crate::pipeline::figures::FigureSource;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Language the summaries are translated into unless configured otherwise.
pub const DEFAULT_TARGET_LANGUAGE: &str = "Norwegian";

/// Configuration for a single paper-to-post run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use paper2post::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .output_root("site")
///     .model("gemini-2.0-flash")
///     .target_language("Norwegian")
///     .build()
///     .unwrap();
/// assert_eq!(config.min_figure_dimension, 100);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, uses the backend's default.
    pub model: Option<String>,

    /// Provider name ("gemini", "openai", "anthropic", "ollama", …).
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// API key for the native Gemini backend. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Pre-constructed model backend. Takes precedence over every other
    /// provider setting.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Pre-constructed figure source. Defaults to pdfium extraction.
    pub figure_source: Option<Arc<dyn FigureSource>>,

    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,

    /// Sampling temperature for every generation call. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Retry attempts on a failed generation call. Default: 0.
    ///
    /// The pipeline retries nothing unless asked to; a failed summary
    /// aborts the run on the first error.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for model and staging requests, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Root of the Jekyll site. `_posts/`, `assets/` and the metadata
    /// sidecar are written below it. Default: current directory.
    pub output_root: PathBuf,

    /// Language to translate the summaries into. `None` keeps them in English.
    pub target_language: Option<String>,

    /// Extract embedded figures and select one per tier. Default: true.
    pub extract_figures: bool,

    /// Parent directory for the figure work directory. `None` uses the
    /// system temp directory.
    pub scratch_dir: Option<PathBuf>,

    /// Minimum width and height, in pixels, for an embedded image to count
    /// as a figure. Default: 100.
    pub min_figure_dimension: u32,

    /// Attach the paper again when deriving the high-school and child
    /// summaries. Their prompts always embed the previous tier's text.
    /// Default: true.
    pub reattach_document: bool,

    /// Run the quality review step. Default: true.
    pub review: bool,

    /// Write `_paper_metadata.txt` for CI consumers. Default: true.
    pub write_metadata_file: bool,

    /// Delete staged uploads at the end of the run. Default: true.
    pub cleanup_uploads: bool,

    /// Pages rasterised when a chat provider without document support has
    /// to be shown the paper. Default: 20.
    pub max_document_pages: usize,

    /// Longest edge of a rasterised page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Optional stage-progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            api_key: None,
            backend: None,
            figure_source: None,
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            output_root: PathBuf::from("."),
            target_language: Some(DEFAULT_TARGET_LANGUAGE.to_string()),
            extract_figures: true,
            scratch_dir: None,
            min_figure_dimension: 100,
            reattach_document: true,
            review: true,
            write_metadata_file: true,
            cleanup_uploads: true,
            max_document_pages: 20,
            max_rendered_pixels: 2000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ModelBackend>"))
            .field(
                "figure_source",
                &self.figure_source.as_ref().map(|_| "<dyn FigureSource>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("output_root", &self.output_root)
            .field("target_language", &self.target_language)
            .field("extract_figures", &self.extract_figures)
            .field("scratch_dir", &self.scratch_dir)
            .field("min_figure_dimension", &self.min_figure_dimension)
            .field("reattach_document", &self.reattach_document)
            .field("review", &self.review)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn figure_source(mut self, source: Arc<dyn FigureSource>) -> Self {
        self.config.figure_source = Some(source);
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.config.target_language = Some(language.into());
        self
    }

    /// Keep the summaries in the language they were generated in.
    pub fn no_translation(mut self) -> Self {
        self.config.target_language = None;
        self
    }

    pub fn extract_figures(mut self, v: bool) -> Self {
        self.config.extract_figures = v;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn min_figure_dimension(mut self, px: u32) -> Self {
        self.config.min_figure_dimension = px;
        self
    }

    pub fn reattach_document(mut self, v: bool) -> Self {
        self.config.reattach_document = v;
        self
    }

    pub fn review(mut self, v: bool) -> Self {
        self.config.review = v;
        self
    }

    pub fn write_metadata_file(mut self, v: bool) -> Self {
        self.config.write_metadata_file = v;
        self
    }

    pub fn cleanup_uploads(mut self, v: bool) -> Self {
        self.config.cleanup_uploads = v;
        self
    }

    pub fn max_document_pages(mut self, n: usize) -> Self {
        self.config.max_document_pages = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Paper2PostError> {
        let c = &self.config;
        if c.min_figure_dimension == 0 {
            return Err(Paper2PostError::InvalidConfig(
                "Minimum figure dimension must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Paper2PostError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_document_pages == 0 {
            return Err(Paper2PostError::InvalidConfig(
                "max_document_pages must be ≥ 1".into(),
            ));
        }
        if let Some(lang) = &c.target_language {
            if lang.trim().is_empty() {
                return Err(Paper2PostError::InvalidConfig(
                    "Target language must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
