//! Metadata Extractor: title, authors and publication date.
//!
//! Each field is one model call followed by a pure validation function.
//! None of them can fail the run: a failed call or an unusable response
//! degrades to a deterministic fallback (file stem, no authors, today).

use crate::model::{ContentPart, ModelBackend, StagedFile};
use crate::outcome::{Stage, StageIssue, StageOutcome};
use crate::progress::PipelineProgressCallback;
use crate::prompts::{AUTHORS_PROMPT, DATE_NOT_FOUND, DATE_PROMPT, TITLE_PROMPT};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Titles shorter than this many characters are replaced by the file stem.
pub const MIN_TITLE_CHARS: usize = 5;

/// Author strings this short (after prefix stripping) are discarded.
const MAX_REJECTED_AUTHORS_CHARS: usize = 2;

const AUTHOR_FAILURE_MARKERS: [&str; 3] = ["unable", "cannot", "error"];

const AUTHOR_PREFIXES: [&str; 2] = ["Authors:", "By:"];

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));
static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s+(\w{3})\s+(\d{4})").expect("valid regex"));
static MONTH_DAY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w{3})\s+(\d{1,2}),?\s+(\d{4})").expect("valid regex"));

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Bibliographic metadata of the paper, after fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    /// Comma-separated; empty when no usable authors were found.
    pub authors: String,
    pub date: NaiveDate,
}

// ── Pure validation ──────────────────────────────────────────────────────

/// Accept the model's title, or fall back to the file stem.
pub fn resolve_title(raw: &str, paper_name: &str) -> StageOutcome<String> {
    let title = raw.trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        return StageOutcome::degraded(
            paper_name.to_string(),
            format!("title response {title:?} too short, using file name"),
        );
    }
    StageOutcome::Ok(title.to_string())
}

/// Strip label prefixes and reject responses that are too short or read
/// like a refusal.
pub fn resolve_authors(raw: &str) -> StageOutcome<String> {
    let mut authors = raw.trim().to_string();
    for prefix in AUTHOR_PREFIXES {
        authors = authors.replace(prefix, "");
    }
    let authors = authors.trim();

    if authors.chars().count() <= MAX_REJECTED_AUTHORS_CHARS {
        return StageOutcome::degraded(String::new(), "authors response too short");
    }
    let lower = authors.to_lowercase();
    if let Some(marker) = AUTHOR_FAILURE_MARKERS.iter().find(|m| lower.contains(*m)) {
        return StageOutcome::degraded(
            String::new(),
            format!("authors response contains {marker:?}"),
        );
    }
    StageOutcome::Ok(authors.to_string())
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

fn ymd(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}

/// Parse a date the model returned, trying strict ISO first and then the
/// patterns below on the first match of each. `None` when nothing yields a
/// real calendar date.
pub fn parse_paper_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(DATE_NOT_FOUND) {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    type Extract = fn(&Captures<'_>) -> Option<NaiveDate>;
    let patterns: [(&Lazy<Regex>, Extract); 3] = [
        (&ISO_DATE, |c| ymd(&c[1], c[2].parse().ok()?, &c[3])),
        (&DAY_MONTH_YEAR, |c| ymd(&c[3], month_number(&c[2])?, &c[1])),
        (&MONTH_DAY_YEAR, |c| ymd(&c[3], month_number(&c[1])?, &c[2])),
    ];

    patterns
        .iter()
        .filter_map(|(re, extract)| re.captures(raw).and_then(|c| extract(&c)))
        .next()
}

/// Parse the date or fall back to `today`.
pub fn resolve_date(raw: &str, today: NaiveDate) -> StageOutcome<NaiveDate> {
    match parse_paper_date(raw) {
        Some(date) => StageOutcome::Ok(date),
        None => StageOutcome::degraded(
            today,
            format!("no date in response {:?}, using current date", raw.trim()),
        ),
    }
}

// ── Model calls ──────────────────────────────────────────────────────────

async fn ask(
    backend: &dyn ModelBackend,
    prompt: &str,
    document: &StagedFile,
) -> Result<String, crate::error::ModelError> {
    let parts = [ContentPart::text(prompt), ContentPart::File(document.clone())];
    let reply = backend.generate(&parts).await?;
    debug!("Raw response: {:?}", reply);
    Ok(reply)
}

fn record<T>(
    stage: Stage,
    outcome: StageOutcome<T>,
    fallback: impl FnOnce() -> T,
    issues: &mut Vec<StageIssue>,
    progress: &dyn PipelineProgressCallback,
) -> T {
    match outcome {
        StageOutcome::Ok(v) => {
            progress.on_stage_complete(stage);
            v
        }
        StageOutcome::Degraded { value, reason } => {
            warn!("{}: {}", stage, reason);
            progress.on_stage_degraded(stage, &reason);
            issues.push(StageIssue::new(stage, reason));
            value
        }
        StageOutcome::Fatal(e) => {
            warn!("{}: {}", stage, e);
            progress.on_stage_degraded(stage, &e.to_string());
            issues.push(StageIssue::new(stage, e.to_string()));
            fallback()
        }
    }
}

/// Ask for title, authors and date in turn and apply every fallback.
///
/// Never fails: the returned issues list each field that degraded.
pub async fn extract_metadata(
    backend: &dyn ModelBackend,
    document: &StagedFile,
    paper_name: &str,
    today: NaiveDate,
    progress: &dyn PipelineProgressCallback,
) -> (PaperMetadata, Vec<StageIssue>) {
    let mut issues = Vec::new();

    progress.on_stage_start(Stage::Title);
    let outcome = match ask(backend, TITLE_PROMPT, document).await {
        Ok(raw) => resolve_title(&raw, paper_name),
        Err(e) => StageOutcome::degraded(paper_name.to_string(), format!("call failed: {e}")),
    };
    let title = record(Stage::Title, outcome, || paper_name.to_string(), &mut issues, progress);
    info!("Title: {}", title);

    progress.on_stage_start(Stage::Authors);
    let outcome = match ask(backend, AUTHORS_PROMPT, document).await {
        Ok(raw) => resolve_authors(&raw),
        Err(e) => StageOutcome::degraded(String::new(), format!("call failed: {e}")),
    };
    let authors = record(Stage::Authors, outcome, String::new, &mut issues, progress);
    if authors.is_empty() {
        info!("No authors extracted, leaving blank");
    } else {
        info!("Authors: {}", authors);
    }

    progress.on_stage_start(Stage::Date);
    let outcome = match ask(backend, DATE_PROMPT, document).await {
        Ok(raw) => resolve_date(&raw, today),
        Err(e) => StageOutcome::degraded(today, format!("call failed: {e}")),
    };
    let date = record(Stage::Date, outcome, || today, &mut issues, progress);
    info!("Paper date: {}", date);

    (PaperMetadata { title, authors, date }, issues)
}
