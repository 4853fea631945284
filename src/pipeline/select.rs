//! Figure Selector: at most one figure per tier, chosen by the model.
//!
//! Candidates are shown as `Figure 1:`, `Figure 2:`, … each followed by the
//! staged image. The answer must be `Figure <N>` or `NONE`; anything else
//! means no figure for that tier.

use super::figures::UploadedFigure;
use crate::model::{ContentPart, GenerativeModel};
use crate::outcome::StageOutcome;
use crate::prompts::{figure_label, figure_selection_prompt};
use crate::tier::SummaryTier;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static RE_SELECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^figure\s*(\d+)$").expect("valid regex"));

/// Map a selection response to a 0-based candidate index.
///
/// Surrounding quotes, emphasis markers and a trailing full stop are
/// tolerated. Out-of-range numbers and anything unrecognised yield `None`.
pub fn parse_selection(response: &str, candidates: usize) -> Option<usize> {
    let answer = bare_answer(response);
    if answer.eq_ignore_ascii_case("NONE") {
        return None;
    }

    let n: usize = RE_SELECTION.captures(answer)?[1].parse().ok()?;
    (1..=candidates).contains(&n).then(|| n - 1)
}

fn bare_answer(response: &str) -> &str {
    response
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '`'))
        .trim_end_matches('.')
        .trim()
}

/// Ask the model to pick a figure for `tier`'s summary.
///
/// With no candidates no call is made. A failed call or an unrecognised
/// answer degrades to no selection.
pub async fn select_figure(
    model: &dyn GenerativeModel,
    figures: &[UploadedFigure],
    tier: SummaryTier,
    summary: &str,
) -> StageOutcome<Option<usize>> {
    if figures.is_empty() {
        debug!("No figures available for {} selection", tier);
        return StageOutcome::Ok(None);
    }

    let mut parts = Vec::with_capacity(1 + 2 * figures.len());
    parts.push(ContentPart::text(figure_selection_prompt(tier, summary)));
    for (i, fig) in figures.iter().enumerate() {
        parts.push(ContentPart::text(figure_label(i + 1)));
        parts.push(ContentPart::File(fig.staged.clone()));
    }

    let response = match model.generate(&parts).await {
        Ok(r) => r,
        Err(e) => return StageOutcome::degraded(None, e.to_string()),
    };
    let answer = bare_answer(&response);

    match parse_selection(answer, figures.len()) {
        Some(idx) => {
            info!(
                "Selected figure {} ({}) for {}",
                idx + 1,
                figures[idx].figure.id,
                tier
            );
            StageOutcome::Ok(Some(idx))
        }
        None if answer.eq_ignore_ascii_case("NONE") => {
            info!("No appropriate figure for {}", tier);
            StageOutcome::Ok(None)
        }
        None => StageOutcome::degraded(None, format!("unrecognised selection {answer:?}")),
    }
}
