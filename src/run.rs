//! Pipeline driver: one paper in, one post out.
//!
//! Stages run strictly one after another on the calling task. The driver
//! owns the failure policy: a stage reports what happened, the driver
//! decides whether the run goes on (see [`crate::outcome`]).
//!
//! Staged uploads are deleted at the end of every run that got as far as
//! staging the paper, including runs that fail afterwards.

use crate::config::PipelineConfig;
use crate::error::Paper2PostError;
use crate::model::{resolve_backend, ModelBackend, StagedFile};
use crate::outcome::{Stage, StageIssue, StageOutcome};
use crate::output::{RunReport, RunStats};
use crate::pipeline::figures::{self, Figure, PdfiumFigureSource, UploadedFigure};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::metadata::{self, PaperMetadata};
use crate::pipeline::post::{self, PersistedFigure, PostInput};
use crate::pipeline::{review, select, summarize, translate};
use crate::progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
use crate::tier::{SummaryTier, Tiered};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Language of the summaries when translation is disabled.
const SOURCE_LANGUAGE: &str = "English";

/// Turn one research-paper PDF into a tiered-summary blog post.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunReport)` once the post is written, even if optional stages
/// degraded (check `report.issues`).
///
/// # Errors
/// Returns `Err(Paper2PostError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - No model provider configured
/// - The paper could not be staged
/// - A summary or translation call failed (no post is written)
/// - The post could not be written
///
/// Every fatal error is also reported to the progress callback's
/// [`on_run_failed`](PipelineProgressCallback::on_run_failed).
pub async fn summarize_paper(
    input_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunReport, Paper2PostError> {
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    let result = run_paper(input_path.as_ref(), config, &progress).await;
    if let Err(e) = &result {
        warn!("Run failed: {}", e);
        progress.on_run_failed(&e.to_string());
    }
    result
}

async fn run_paper(
    input_path: &Path,
    config: &PipelineConfig,
    progress: &ProgressCallback,
) -> Result<RunReport, Paper2PostError> {
    let started = Instant::now();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_path)?;
    info!("Starting run for paper '{}'", resolved.paper_name);

    // ── Step 2: Get/create backend ───────────────────────────────────────
    let backend = resolve_backend(config)?;
    progress.on_run_start(&resolved.paper_name);

    // ── Step 3: Stage the paper ──────────────────────────────────────────
    progress.on_stage_start(Stage::DocumentUpload);
    let document = backend
        .upload(&resolved.path)
        .await
        .map_err(|source| Paper2PostError::UploadFailed {
            path: resolved.path.clone(),
            source,
        })?;
    progress.on_stage_complete(Stage::DocumentUpload);
    info!("Uploaded paper as {}", document.name);

    let mut run = Run {
        backend: backend.as_ref(),
        config,
        progress: progress.as_ref(),
        staged: vec![document.name.clone()],
        issues: Vec::new(),
        stats: RunStats::default(),
    };

    // ── Steps 4–11: Everything up to and including the post ──────────────
    let produced = run.produce(&resolved, &document).await;

    // ── Step 12: Cleanup, whatever happened above ────────────────────────
    if config.cleanup_uploads {
        run.cleanup().await;
    } else {
        debug!("Keeping {} staged uploads", run.staged.len());
    }

    let produced = produced?;

    // ── Step 13: CI sidecar ──────────────────────────────────────────────
    let metadata_file = if config.write_metadata_file {
        run.progress.on_stage_start(Stage::MetadataFile);
        match post::write_metadata_sidecar(
            &config.output_root,
            &produced.metadata,
            &resolved.paper_name,
            &produced.post_relative_path,
        )
        .await
        {
            Ok(path) => {
                run.progress.on_stage_complete(Stage::MetadataFile);
                Some(path)
            }
            Err(e) => {
                run.degrade(Stage::MetadataFile, e.to_string());
                None
            }
        }
    } else {
        None
    };

    run.stats.total_duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} ({} issues, {}ms)",
        produced.post_path.display(),
        run.issues.len(),
        run.stats.total_duration_ms
    );
    progress.on_run_complete(&produced.post_path.to_string_lossy());

    Ok(RunReport {
        paper_name: resolved.paper_name,
        post_path: produced.post_path,
        post_relative_path: produced.post_relative_path,
        metadata_file,
        metadata: produced.metadata,
        language: produced.language,
        summaries: produced.summaries,
        review: produced.review,
        figures: produced.figures,
        stats: run.stats,
        issues: run.issues,
    })
}

/// Synchronous wrapper around [`summarize_paper`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_paper_sync(
    input_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunReport, Paper2PostError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Paper2PostError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(summarize_paper(input_path, config))
}

/// What [`Run::produce`] hands back once the post is on disk.
struct Produced {
    metadata: PaperMetadata,
    language: String,
    summaries: Tiered<String>,
    review: Option<String>,
    figures: Tiered<Option<PersistedFigure>>,
    post_path: PathBuf,
    post_relative_path: PathBuf,
}

/// Mutable state of one run.
struct Run<'a> {
    backend: &'a dyn ModelBackend,
    config: &'a PipelineConfig,
    progress: &'a dyn PipelineProgressCallback,
    /// Names of every staged upload, deleted during cleanup.
    staged: Vec<String>,
    issues: Vec<StageIssue>,
    stats: RunStats,
}

impl Run<'_> {
    fn degrade(&mut self, stage: Stage, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{} degraded: {}", stage, reason);
        self.progress.on_stage_degraded(stage, &reason);
        self.issues.push(StageIssue::new(stage, reason));
    }

    /// Unwrap a degradable outcome, recording the issue if it degraded.
    fn settle<T>(&mut self, stage: Stage, outcome: StageOutcome<T>) -> Result<T, Paper2PostError> {
        let (value, issue) = outcome.into_result(stage)?;
        match issue {
            Some(issue) => self.degrade(issue.stage, issue.reason),
            None => self.progress.on_stage_complete(stage),
        }
        Ok(value)
    }

    fn absorb(&mut self, issues: Vec<StageIssue>) {
        for issue in issues {
            self.degrade(issue.stage, issue.reason);
        }
    }

    async fn produce(
        &mut self,
        resolved: &ResolvedInput,
        document: &StagedFile,
    ) -> Result<Produced, Paper2PostError> {
        let config = self.config;
        let backend = self.backend;

        // ── Step 4: Figures ──────────────────────────────────────────────
        let uploaded = if config.extract_figures {
            self.stage_figures(&resolved.path).await?
        } else {
            debug!("Figure extraction disabled");
            Vec::new()
        };

        // ── Step 5: Metadata ─────────────────────────────────────────────
        let today = Local::now().date_naive();
        let (metadata, issues) = metadata::extract_metadata(
            backend,
            document,
            &resolved.paper_name,
            today,
            self.progress,
        )
        .await;
        self.issues.extend(issues);

        let post_relative_path = input::post_relative_path(metadata.date, &resolved.paper_name);
        info!("Post path: {}", post_relative_path.display());

        // ── Step 6: Tiered summaries ─────────────────────────────────────
        let english =
            summarize::summarize_tiers(backend, document, config.reattach_document, self.progress)
                .await?;

        // ── Step 7: Translation ──────────────────────────────────────────
        let (summaries, language) = match config.target_language.as_deref() {
            Some(language) => {
                let translated =
                    translate::translate_tiers(backend, &english, language, self.progress).await?;
                (translated, language.to_string())
            }
            None => (english, SOURCE_LANGUAGE.to_string()),
        };

        // ── Step 8: Quality review ───────────────────────────────────────
        let review = if config.review {
            self.progress.on_stage_start(Stage::Review);
            let outcome = review::review_summaries(backend, document, &summaries, &language).await;
            Some(self.settle(Stage::Review, outcome)?)
        } else {
            None
        };

        // ── Step 9: Figure selection ─────────────────────────────────────
        let mut chosen = Tiered::<Option<&Figure>>::default();
        if !uploaded.is_empty() {
            for tier in SummaryTier::GENERATION_ORDER {
                let stage = Stage::FigureSelection(tier);
                self.progress.on_stage_start(stage);
                let outcome =
                    select::select_figure(backend, &uploaded, tier, summaries.get(tier)).await;
                let selected = self.settle(stage, outcome)?;
                *chosen.get_mut(tier) = selected.map(|idx| &uploaded[idx].figure);
            }
        }

        // ── Step 10: Persist selected figures ────────────────────────────
        let figures = if chosen.child.is_some()
            || chosen.high_school.is_some()
            || chosen.university.is_some()
        {
            self.progress.on_stage_start(Stage::FigurePersist);
            let (persisted, issues) =
                post::persist_figures(&config.output_root, &resolved.paper_name, &chosen).await;
            if issues.is_empty() {
                self.progress.on_stage_complete(Stage::FigurePersist);
            }
            self.absorb(issues);
            persisted
        } else {
            Tiered::default()
        };
        self.stats.figures_placed = SummaryTier::POST_ORDER
            .iter()
            .filter(|t| figures.get(**t).is_some())
            .count();

        // ── Step 11: Render and write the post ───────────────────────────
        self.progress.on_stage_start(Stage::PostWrite);
        let rendered = post::render_post(&PostInput {
            paper_name: &resolved.paper_name,
            metadata: &metadata,
            summaries: &summaries,
            figures: &figures,
        });
        let post_path = post::write_post(&config.output_root, &rendered).await?;
        self.progress.on_stage_complete(Stage::PostWrite);

        Ok(Produced {
            metadata,
            language,
            summaries,
            review,
            figures,
            post_path,
            post_relative_path,
        })
    }

    /// Extract figures and stage them, recording every staged name.
    async fn stage_figures(
        &mut self,
        pdf_path: &Path,
    ) -> Result<Vec<UploadedFigure>, Paper2PostError> {
        self.progress.on_stage_start(Stage::FigureExtraction);
        let source = self
            .config
            .figure_source
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumFigureSource));
        let outcome =
            figures::extract_figures(source, pdf_path, self.config.min_figure_dimension).await;
        let extracted = self.settle(Stage::FigureExtraction, outcome)?;
        self.stats.figures_extracted = extracted.len();
        if extracted.is_empty() {
            return Ok(Vec::new());
        }

        self.progress.on_stage_start(Stage::FigureUpload);
        // Figure PNGs live here only while they are uploaded.
        let work_dir = match figure_work_dir(self.config.scratch_dir.as_deref()) {
            Ok(dir) => dir,
            Err(e) => {
                self.degrade(
                    Stage::FigureUpload,
                    format!("cannot create figure work dir: {e}"),
                );
                return Ok(Vec::new());
            }
        };
        let (uploaded, issues) =
            figures::stage_figures(self.backend, &extracted, work_dir.path()).await;
        self.staged
            .extend(uploaded.iter().map(|f| f.staged.name.clone()));
        if issues.is_empty() {
            self.progress.on_stage_complete(Stage::FigureUpload);
        }
        self.absorb(issues);
        self.stats.figures_uploaded = uploaded.len();
        Ok(uploaded)
    }

    /// Delete every staged upload. Failures are logged and recorded only.
    async fn cleanup(&mut self) {
        self.progress.on_stage_start(Stage::Cleanup);
        let mut failures = Vec::new();
        for name in std::mem::take(&mut self.staged) {
            match self.backend.delete(&name).await {
                Ok(()) => {
                    debug!("Deleted staged file {}", name);
                    self.stats.uploads_deleted += 1;
                }
                Err(e) => failures.push(format!("{name}: {e}")),
            }
        }

        if failures.is_empty() {
            self.progress.on_stage_complete(Stage::Cleanup);
        } else {
            self.degrade(Stage::Cleanup, failures.join("; "));
        }
    }
}

/// Create the directory figure PNGs are written to before upload.
fn figure_work_dir(parent: Option<&Path>) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("paper2post-figures-");
    match parent {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
}
