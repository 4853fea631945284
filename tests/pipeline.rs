//! Whole-run tests against the scripted backend.
//!
//! These drive [`summarize_paper`] end to end without network access or a
//! pdfium library: the model is a [`ScriptedModel`] and figures come from an
//! in-memory [`FigureSource`]. The input "PDF" only needs the `%PDF` magic,
//! since nothing here parses it.

use paper2post::model::ScriptedModel;
use paper2post::pipeline::review::REVIEW_PLACEHOLDER;
use paper2post::progress::PipelineProgressCallback;
use paper2post::{
    summarize_paper, Figure, FigureSource, ModelBackend, Paper2PostError, PipelineConfig, Stage,
    SummaryTier,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────

/// A scratch directory holding `attention.pdf` and an empty site root.
struct Workspace {
    _dir: TempDir,
    pdf: PathBuf,
    site: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("attention.pdf");
    std::fs::write(&pdf, b"%PDF-1.7\n% scripted fixture\n").unwrap();
    let site = dir.path().join("site");
    std::fs::create_dir_all(&site).unwrap();
    Workspace {
        _dir: dir,
        pdf,
        site,
    }
}

/// Script covering every call of a full run. Rules are checked in order,
/// so the most specific needles come first; `fail_when` rules layered on
/// top win over all of them.
fn scripted() -> ScriptedModel {
    ScriptedModel::new("unexpected request")
        .reply_when("quality reviewer", "Summaries are accurate and appropriate for their target audiences.")
        .reply_when("Target Audience: child", "NONE")
        .reply_when("Target Audience: high_school", "Figure 2")
        .reply_when("Target Audience: university", "**Figure 1.**")
        .reply_when("Text to translate: UNI-EN", "UNI-NO")
        .reply_when("Text to translate: HS-EN", "HS-NO")
        .reply_when("Text to translate: CHILD-EN", "CHILD-NO")
        .reply_when("university/college level", "UNI-EN")
        .reply_when("16-18 year olds", "HS-EN")
        .reply_when("ages 8-12", "CHILD-EN")
        .reply_when("Extract the title", "Attention Is All You Need")
        .reply_when("Extract the authors", "A, B")
        .reply_when("publication date", "2017-06-12")
}

/// Figure source returning fixed PNG payloads.
struct FixedFigures(Vec<Figure>);

impl FigureSource for FixedFigures {
    fn extract(&self, _pdf: &Path, _min_dimension: u32) -> Result<Vec<Figure>, Paper2PostError> {
        Ok(self.0.clone())
    }
}

fn two_figures() -> Arc<dyn FigureSource> {
    Arc::new(FixedFigures(vec![
        Figure::new(1, 0, 400, 300, b"png-architecture".to_vec()),
        Figure::new(3, 1, 640, 480, b"png-attention-map".to_vec()),
    ]))
}

fn config(model: &Arc<ScriptedModel>, site: &Path) -> paper2post::config::PipelineConfigBuilder {
    let backend: Arc<dyn ModelBackend> = model.clone();
    PipelineConfig::builder()
        .backend(backend)
        .output_root(site)
        .extract_figures(false)
}

fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ── Full run ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_run_writes_post_and_sidecar() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site).build().unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.paper_name, "attention");
    assert_eq!(
        report.post_relative_path,
        PathBuf::from("_posts/2017-06-12-attention.markdown")
    );
    assert_eq!(report.language, "Norwegian");
    assert!(!report.is_degraded(), "issues: {:?}", report.issues);

    let post = read(ws.site.join("_posts/2017-06-12-attention.markdown"));
    let expected = "---\n\
layout: tabbed_post\n\
title: \"Attention Is All You Need\"\n\
paper_id: \"attention\"\n\
authors: \"A, B\"\n\
date: 2017-06-12 12:00:00 +0000\n\
categories: ai forskning\n\
---\n\
\n## For Barn\n\nCHILD-NO\n\
\n## For Videregåendeelever\n\nHS-NO\n\
\n## For Universitets- og Høyskolenivå\n\nUNI-NO\n";
    assert_eq!(post, expected);

    let sidecar = read(ws.site.join("_paper_metadata.txt"));
    assert_eq!(
        sidecar,
        "PAPER_TITLE=Attention Is All You Need\n\
PAPER_AUTHORS=A, B\n\
PAPER_ID=attention\n\
POST_PATH=_posts/2017-06-12-attention.markdown\n"
    );
    assert_eq!(report.metadata_file, Some(ws.site.join("_paper_metadata.txt")));
}

#[tokio::test]
async fn test_full_run_deletes_every_upload() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(model.uploads().len(), 3, "paper plus two figures");
    assert!(model.live_files().is_empty());
    assert_eq!(model.deleted().len(), 3);
    assert_eq!(report.stats.uploads_deleted, 3);
}

#[tokio::test]
async fn test_summaries_are_derived_in_order() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site).build().unwrap();

    summarize_paper(&ws.pdf, &config).await.unwrap();

    let prompts = model.prompts();
    let position = |needle: &str| {
        prompts
            .iter()
            .position(|p| p.contains(needle))
            .unwrap_or_else(|| panic!("no prompt containing {needle:?}"))
    };
    let uni = position("university/college level");
    let hs = position("16-18 year olds");
    let child = position("ages 8-12");
    assert!(uni < hs && hs < child);
    assert!(prompts[hs].contains("Advanced Summary: UNI-EN"));
    assert!(prompts[child].contains("High School Summary: HS-EN"));
}

// ── Date fallback ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_date_falls_back_to_today() {
    let ws = workspace();
    let model = Arc::new(
        ScriptedModel::new("SUMMARY")
            .reply_when("Extract the title", "Attention Is All You Need")
            .reply_when("Extract the authors", "A, B")
            .reply_when("publication date", "NOT_FOUND"),
    );
    let config = config(&model, &ws.site).no_translation().review(false).build().unwrap();

    let today = chrono::Local::now().date_naive();
    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.metadata.date, today);
    let name = format!("_posts/{}-attention.markdown", today.format("%Y-%m-%d"));
    assert!(ws.site.join(&name).is_file(), "missing {name}");
    assert!(report.issues.iter().any(|i| i.stage == Stage::Date));
}

#[tokio::test]
async fn test_unusable_metadata_uses_fallbacks() {
    let ws = workspace();
    let model = Arc::new(
        ScriptedModel::new("SUMMARY")
            .reply_when("Extract the title", "N/A")
            .reply_when("Extract the authors", "I am unable to determine the authors.")
            .reply_when("publication date", "Submitted on 15 Mar 2024"),
    );
    let config = config(&model, &ws.site).no_translation().review(false).build().unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.metadata.title, "attention");
    assert_eq!(report.metadata.authors, "");
    assert_eq!(
        report.post_relative_path,
        PathBuf::from("_posts/2024-03-15-attention.markdown")
    );
    let post = read(ws.site.join(&report.post_relative_path));
    assert!(post.contains("title: \"attention\"\n"));
    assert!(post.contains("authors: \"\"\n"));
}

// ── Figures ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_selected_figures_are_persisted_and_referenced() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    let assets = ws.site.join("assets/papers/attention");
    assert_eq!(read(assets.join("high_school_fig.png")), "png-attention-map");
    assert_eq!(read(assets.join("university_fig.png")), "png-architecture");
    assert!(!assets.join("child_fig.png").exists());

    let post = read(ws.site.join(&report.post_relative_path));
    assert!(post.contains(
        "\n![Figure for videregående](/assets/papers/attention/high_school_fig.png)\n"
    ));
    assert!(post.contains(
        "\n![Figure for universitets- og høyskolenivå](/assets/papers/attention/university_fig.png)\n"
    ));
    assert!(!post.contains("child_fig.png"));

    assert_eq!(report.stats.figures_extracted, 2);
    assert_eq!(report.stats.figures_uploaded, 2);
    assert_eq!(report.stats.figures_placed, 2);
    assert!(report.figures.child.is_none());
    assert_eq!(report.figures.high_school.as_ref().unwrap().figure_id(), "fig_3_1");
}

#[tokio::test]
async fn test_selection_sees_translated_summary_and_labelled_figures() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    summarize_paper(&ws.pdf, &config).await.unwrap();

    let prompts = model.prompts();
    let selection = prompts
        .iter()
        .find(|p| p.contains("Target Audience: high_school"))
        .unwrap();
    assert!(selection.contains("Summary Text: HS-NO"));
    assert!(selection.contains("Figure 1:"));
    assert!(selection.contains("Figure 2:"));
}

#[tokio::test]
async fn test_no_figures_means_no_selection_calls() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(Arc::new(FixedFigures(Vec::new())))
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert!(model.prompts().iter().all(|p| !p.contains("Target Audience")));
    assert!(!ws.site.join("assets").exists());
    assert!(!read(ws.site.join(&report.post_relative_path)).contains("!["));
}

#[tokio::test]
async fn test_failed_figure_upload_still_cleans_up() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_upload_of("fig_1_0"));
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.stats.figures_uploaded, 1);
    assert!(report.issues.iter().any(|i| i.stage == Stage::FigureUpload));
    assert!(model.live_files().is_empty());
    assert_eq!(report.stats.uploads_deleted, 2);
}

#[tokio::test]
async fn test_failing_figure_source_degrades() {
    struct Broken;
    impl FigureSource for Broken {
        fn extract(&self, _: &Path, _: u32) -> Result<Vec<Figure>, Paper2PostError> {
            Err(Paper2PostError::Internal("pdfium unavailable".into()))
        }
    }

    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(Arc::new(Broken))
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert!(report
        .issues
        .iter()
        .any(|i| i.stage == Stage::FigureExtraction && i.reason.contains("pdfium unavailable")));
    assert!(ws.site.join(&report.post_relative_path).is_file());
}

// ── Fatal failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_summary_failure_writes_nothing_but_cleans_up() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_when("16-18 year olds", "quota exhausted"));
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    let err = summarize_paper(&ws.pdf, &config).await.unwrap_err();

    assert!(
        matches!(
            err,
            Paper2PostError::GenerationFailed {
                stage: Stage::Summary(SummaryTier::HighSchool),
                ..
            }
        ),
        "got {err:?}"
    );
    assert!(!ws.site.join("_posts").exists());
    assert!(!ws.site.join("_paper_metadata.txt").exists());
    assert!(model.live_files().is_empty());
    assert!(model.prompts().iter().all(|p| !p.contains("ages 8-12")));
}

#[tokio::test]
async fn test_translation_failure_is_fatal() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_when("Text to translate: CHILD-EN", "blocked"));
    let config = config(&model, &ws.site).build().unwrap();

    let err = summarize_paper(&ws.pdf, &config).await.unwrap_err();

    assert!(matches!(
        err,
        Paper2PostError::GenerationFailed {
            stage: Stage::Translation(SummaryTier::Child),
            ..
        }
    ));
    assert!(!ws.site.join("_posts").exists());
    assert!(model.live_files().is_empty());
}

#[tokio::test]
async fn test_not_a_pdf_fails_before_any_call() {
    let ws = workspace();
    let bogus = ws.site.join("notes.pdf");
    std::fs::write(&bogus, "plain text").unwrap();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site).build().unwrap();

    let err = summarize_paper(&bogus, &config).await.unwrap_err();

    assert!(matches!(err, Paper2PostError::NotAPdf { .. }), "got {err:?}");
    assert!(model.uploads().is_empty());
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_rejected_document_upload_is_fatal() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_upload_of("attention.pdf"));
    let config = config(&model, &ws.site).build().unwrap();

    let err = summarize_paper(&ws.pdf, &config).await.unwrap_err();

    assert!(matches!(err, Paper2PostError::UploadFailed { .. }));
    assert!(model.calls().is_empty());
}

// ── Degradations ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_review_failure_uses_placeholder() {
    let ws = workspace();
    let model = Arc::new(
        ScriptedModel::new("SUMMARY")
            .fail_when("quality reviewer", "overloaded")
            .reply_when("Extract the title", "Attention Is All You Need")
            .reply_when("publication date", "2017-06-12"),
    );
    let config = config(&model, &ws.site).build().unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.review.as_deref(), Some(REVIEW_PLACEHOLDER));
    assert!(report.issues.iter().any(|i| i.stage == Stage::Review));
    assert!(ws.site.join(&report.post_relative_path).is_file());
}

#[tokio::test]
async fn test_cleanup_failure_does_not_fail_run() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_deletes());
    let config = config(&model, &ws.site).build().unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert!(report.issues.iter().any(|i| i.stage == Stage::Cleanup));
    assert_eq!(report.stats.uploads_deleted, 0);
    assert!(ws.site.join("_paper_metadata.txt").is_file());
}

#[tokio::test]
async fn test_unusable_figure_work_dir_drops_figures_only() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .scratch_dir(ws.site.join("missing").join("scratch"))
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert!(report
        .issues
        .iter()
        .any(|i| i.stage == Stage::FigureUpload && i.reason.contains("figure work dir")));
    assert_eq!(report.stats.figures_extracted, 2);
    assert_eq!(report.stats.figures_uploaded, 0);
    assert_eq!(model.uploads(), vec![ws.pdf.clone()]);
    assert!(!ws.site.join("assets").exists());
    assert!(ws.site.join(&report.post_relative_path).is_file());
}

#[tokio::test]
async fn test_figure_work_dir_untouched_without_figures() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .scratch_dir(ws.site.join("missing").join("scratch"))
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert!(report.issues.is_empty(), "got {:?}", report.issues);
    assert!(ws.site.join(&report.post_relative_path).is_file());
}

#[tokio::test]
async fn test_figure_work_dir_is_removed_after_upload() {
    let ws = workspace();
    let scratch = TempDir::new().unwrap();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .scratch_dir(scratch.path())
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.stats.figures_uploaded, 2);
    assert!(model
        .uploads()
        .iter()
        .skip(1)
        .all(|p| p.starts_with(scratch.path())));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

// ── Options ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_no_translation_keeps_english() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site).no_translation().build().unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.language, "English");
    assert_eq!(report.summaries.university, "UNI-EN");
    assert!(model.prompts().iter().all(|p| !p.contains("Text to translate")));
    let review = model
        .prompts()
        .into_iter()
        .find(|p| p.contains("quality reviewer"))
        .unwrap();
    assert!(review.contains("Advanced Summary (English): UNI-EN"));
}

#[tokio::test]
async fn test_custom_target_language() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .target_language("Danish")
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(report.language, "Danish");
    assert!(model
        .prompts()
        .iter()
        .any(|p| p.contains("Translate the following academic summary to Danish")));
}

#[tokio::test]
async fn test_keep_uploads_and_skip_sidecar() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .cleanup_uploads(false)
        .write_metadata_file(false)
        .review(false)
        .build()
        .unwrap();

    let report = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(model.live_files().len(), 1);
    assert!(report.metadata_file.is_none());
    assert!(report.review.is_none());
    assert!(!ws.site.join("_paper_metadata.txt").exists());
    assert!(model.prompts().iter().all(|p| !p.contains("quality reviewer")));
}

#[tokio::test]
async fn test_rerun_produces_identical_post() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let config = config(&model, &ws.site)
        .extract_figures(true)
        .figure_source(two_figures())
        .build()
        .unwrap();

    let first = summarize_paper(&ws.pdf, &config).await.unwrap();
    let first_post = read(&first.post_path);
    let second = summarize_paper(&ws.pdf, &config).await.unwrap();

    assert_eq!(first.post_path, second.post_path);
    assert_eq!(first_post, read(&second.post_path));
    let posts: Vec<_> = std::fs::read_dir(ws.site.join("_posts")).unwrap().collect();
    assert_eq!(posts.len(), 1, "no temp files left behind");
}

// ── Progress ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PipelineProgressCallback for Recorder {
    fn on_run_start(&self, paper_name: &str) {
        self.events.lock().unwrap().push(format!("run:{paper_name}"));
    }
    fn on_stage_complete(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("ok:{stage}"));
    }
    fn on_stage_degraded(&self, stage: Stage, _reason: &str) {
        self.events.lock().unwrap().push(format!("degraded:{stage}"));
    }
    fn on_run_complete(&self, _post_path: &str) {
        self.events.lock().unwrap().push("done".to_string());
    }
    fn on_run_failed(&self, error: &str) {
        self.events.lock().unwrap().push(format!("failed:{error}"));
    }
}

#[tokio::test]
async fn test_progress_events_follow_the_pipeline() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let recorder = Arc::new(Recorder::default());
    let config = config(&model, &ws.site)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    summarize_paper(&ws.pdf, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("run:attention"));
    assert_eq!(events.last().map(String::as_str), Some("done"));
    let at = |e: &str| {
        events
            .iter()
            .position(|x| x == e)
            .unwrap_or_else(|| panic!("missing event {e:?} in {events:?}"))
    };
    assert!(at("ok:university summary") < at("ok:high school summary"));
    assert!(at("ok:high school summary") < at("ok:child summary"));
    assert!(at("ok:child summary") < at("ok:university translation"));
    assert!(at("ok:post write") < at("ok:upload cleanup"));
    assert!(at("ok:upload cleanup") < at("ok:metadata file"));
    assert!(!events.iter().any(|e| e.starts_with("degraded:")));
}

#[tokio::test]
async fn test_fatal_error_is_reported_after_cleanup() {
    let ws = workspace();
    let model = Arc::new(scripted().fail_when("ages 8-12", "quota exhausted"));
    let recorder = Arc::new(Recorder::default());
    let config = config(&model, &ws.site)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    summarize_paper(&ws.pdf, &config).await.unwrap_err();

    let events = recorder.events.lock().unwrap().clone();
    let last = events.last().cloned().unwrap_or_default();
    assert!(
        last.starts_with("failed:") && last.contains("child summary"),
        "got {events:?}"
    );
    assert!(events.contains(&"ok:upload cleanup".to_string()));
    assert!(!events.contains(&"done".to_string()));
}

#[tokio::test]
async fn test_missing_input_is_reported_as_failure() {
    let ws = workspace();
    let model = Arc::new(scripted());
    let recorder = Arc::new(Recorder::default());
    let config = config(&model, &ws.site)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    summarize_paper(ws.site.join("absent.pdf"), &config)
        .await
        .unwrap_err();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1, "got {events:?}");
    assert!(events[0].starts_with("failed:"));
}
