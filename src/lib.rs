//! # paper2post
//!
//! Turn a research-paper PDF into a Jekyll blog post with three
//! audience-tiered summaries (children, high school, university), translated
//! into a target language and illustrated with figures taken from the paper.
//!
//! ## Why tiers that derive from each other?
//!
//! Three independent summaries of the same paper drift apart: each one picks
//! different results to mention and they end up contradicting each other.
//! Here only the university summary is written from the paper; the
//! high-school summary is a rewrite of the university text and the child
//! summary a rewrite of the high-school text, so the simpler tiers can only
//! say less, never something different.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─  1. Input      validate %PDF, paper name = file stem
//!  ├─  2. Upload     stage the paper with the model's file service
//!  ├─  3. Figures    embedded images ≥ 100 px via pdfium, staged (best-effort)
//!  ├─  4. Metadata   title / authors / date with deterministic fallbacks
//!  ├─  5. Summaries  university → high school → child (fatal on failure)
//!  ├─  6. Translate  each tier into the target language (default Norwegian)
//!  ├─  7. Review     quality critique, logged only
//!  ├─  8. Select     one figure per tier, or none
//!  ├─  9. Post       _posts/<date>-<paper>.markdown + assets/papers/<paper>/
//!  ├─ 10. Cleanup    delete every staged upload
//!  └─ 11. Sidecar    _paper_metadata.txt for CI
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper2post::{summarize_paper, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini is used when GEMINI_API_KEY is set; other providers are
//!     // auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::builder().output_root("site").build()?;
//!     let report = summarize_paper("papers/1706.03762.pdf", &config).await?;
//!     println!("{}", report.post_path.display());
//!     for issue in &report.issues {
//!         eprintln!("degraded: {} ({})", issue.stage, issue.reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2post` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! paper2post = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Backend
//!
//! | Backend | Sees the paper as | Selected by |
//! |---------|-------------------|-------------|
//! | Gemini (native) | the PDF itself, via the Files API | `GEMINI_API_KEY` or `--provider gemini` |
//! | Any edgequake-llm provider | rasterised pages (first 20) | `--provider openai` etc., or auto-detection |
//! | [`ScriptedModel`](model::ScriptedModel) | nothing, replies from a script | [`PipelineConfigBuilder::backend`] |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod outcome;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod tier;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_TARGET_LANGUAGE};
pub use error::{ModelError, Paper2PostError};
pub use model::{
    resolve_backend, ContentPart, FileStager, GenerativeModel, ModelBackend, StagedFile,
};
pub use outcome::{Stage, StageIssue, StageOutcome};
pub use output::{RunReport, RunStats};
pub use pipeline::figures::{Figure, FigureSource, PdfiumFigureSource};
pub use pipeline::metadata::PaperMetadata;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{summarize_paper, summarize_paper_sync};
pub use tier::{SummaryTier, Tiered};
