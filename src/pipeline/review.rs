//! Quality Reviewer: a critique of the final summaries against the paper.
//!
//! The critique is logged and reported, never fed back into the summaries.

use crate::model::{ContentPart, GenerativeModel, StagedFile};
use crate::outcome::StageOutcome;
use crate::prompts::review_prompt;
use crate::tier::Tiered;
use tracing::info;

/// Stands in for the critique when the review call fails.
pub const REVIEW_PLACEHOLDER: &str =
    "Quality reflection failed but summaries generated successfully.";

/// Ask for a review of `summaries`, written in `language`.
pub async fn review_summaries(
    model: &dyn GenerativeModel,
    document: &StagedFile,
    summaries: &Tiered<String>,
    language: &str,
) -> StageOutcome<String> {
    let parts = [
        ContentPart::text(review_prompt(summaries, language)),
        ContentPart::File(document.clone()),
    ];

    match model.generate(&parts).await {
        Ok(critique) => {
            let critique = critique.trim().to_string();
            info!("Quality review:\n{}", critique);
            StageOutcome::Ok(critique)
        }
        Err(e) => StageOutcome::degraded(REVIEW_PLACEHOLDER.to_string(), e.to_string()),
    }
}
