//! Result types returned by a pipeline run.

use crate::outcome::StageIssue;
use crate::pipeline::metadata::PaperMetadata;
use crate::pipeline::post::PersistedFigure;
use crate::tier::Tiered;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// File stem of the input PDF.
    pub paper_name: String,

    /// Absolute or root-relative path of the written post.
    pub post_path: PathBuf,

    /// `_posts/<date>-<paper>.markdown`, as recorded in the sidecar.
    pub post_relative_path: PathBuf,

    /// Sidecar path, if it was written.
    pub metadata_file: Option<PathBuf>,

    pub metadata: PaperMetadata,

    /// Language the summaries in the post are written in.
    pub language: String,

    /// Final summaries as they appear in the post.
    pub summaries: Tiered<String>,

    /// Quality critique, or the placeholder when the review failed.
    /// `None` when the review was disabled.
    pub review: Option<String>,

    /// Figures written to the asset directory, per tier.
    pub figures: Tiered<Option<PersistedFigure>>,

    pub stats: RunStats,

    /// Every stage that degraded. Empty on a clean run.
    pub issues: Vec<StageIssue>,
}

impl RunReport {
    /// True when at least one stage fell back to a substitute.
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Relevant figures found in the PDF.
    pub figures_extracted: usize,
    /// Figures successfully staged for selection.
    pub figures_uploaded: usize,
    /// Tiers that ended up with a figure in the post.
    pub figures_placed: usize,
    /// Staged uploads deleted at the end of the run.
    pub uploads_deleted: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
}
