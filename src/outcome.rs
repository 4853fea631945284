//! Per-stage results: success, graceful degradation, or a fatal error.
//!
//! Every pipeline stage reports a [`StageOutcome`]. Stages never decide on
//! their own whether the run survives; they say what happened and the driver
//! in [`crate::run`] applies the policy:
//!
//! | Stage kind | On failure |
//! |------------|------------|
//! | summaries, translations, document upload, post write | abort, no post |
//! | title, authors, date | deterministic fallback value |
//! | figures, review, cleanup, sidecar | feature absent, run continues |

use crate::error::Paper2PostError;
use crate::tier::SummaryTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the pipeline, used for logging, progress events and issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "tier")]
pub enum Stage {
    DocumentUpload,
    FigureExtraction,
    FigureUpload,
    Title,
    Authors,
    Date,
    Summary(SummaryTier),
    Translation(SummaryTier),
    Review,
    FigureSelection(SummaryTier),
    FigurePersist,
    PostWrite,
    Cleanup,
    MetadataFile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::DocumentUpload => f.write_str("document upload"),
            Stage::FigureExtraction => f.write_str("figure extraction"),
            Stage::FigureUpload => f.write_str("figure upload"),
            Stage::Title => f.write_str("title extraction"),
            Stage::Authors => f.write_str("author extraction"),
            Stage::Date => f.write_str("date extraction"),
            Stage::Summary(tier) => write!(f, "{tier} summary"),
            Stage::Translation(tier) => write!(f, "{tier} translation"),
            Stage::Review => f.write_str("quality review"),
            Stage::FigureSelection(tier) => write!(f, "{tier} figure selection"),
            Stage::FigurePersist => f.write_str("figure persistence"),
            Stage::PostWrite => f.write_str("post write"),
            Stage::Cleanup => f.write_str("upload cleanup"),
            Stage::MetadataFile => f.write_str("metadata file"),
        }
    }
}

/// A degradation recorded during a run. The post was still produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIssue {
    pub stage: Stage,
    pub reason: String,
}

impl StageIssue {
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// Result of a single pipeline stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage produced the value it was asked for.
    Ok(T),
    /// The stage fell back to a substitute value.
    Degraded { value: T, reason: String },
    /// The stage failed and the run cannot continue.
    Fatal(Paper2PostError),
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StageOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// The produced or substituted value, if the stage did not fail.
    pub fn value(&self) -> Option<&T> {
        match self {
            StageOutcome::Ok(v) | StageOutcome::Degraded { value: v, .. } => Some(v),
            StageOutcome::Fatal(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Ok(v) => StageOutcome::Ok(f(v)),
            StageOutcome::Degraded { value, reason } => StageOutcome::Degraded {
                value: f(value),
                reason,
            },
            StageOutcome::Fatal(e) => StageOutcome::Fatal(e),
        }
    }

    /// Split into the value and an optional issue, or propagate the fatal error.
    pub fn into_result(self, stage: Stage) -> Result<(T, Option<StageIssue>), Paper2PostError> {
        match self {
            StageOutcome::Ok(v) => Ok((v, None)),
            StageOutcome::Degraded { value, reason } => {
                Ok((value, Some(StageIssue::new(stage, reason))))
            }
            StageOutcome::Fatal(e) => Err(e),
        }
    }
}
