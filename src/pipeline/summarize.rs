//! Tiered Summarizer: university, then high school, then child.
//!
//! Only the university summary is written from the paper. Each later tier
//! is rewritten from the text of the tier before it, so the three stay
//! consistent in what they claim. The paper may be attached again for
//! reference but the prompt always carries the previous tier's text.

use super::postprocess::clean_summary;
use crate::error::{ModelError, Paper2PostError};
use crate::model::{ContentPart, ModelBackend, StagedFile};
use crate::outcome::{Stage, StageOutcome};
use crate::progress::PipelineProgressCallback;
use crate::prompts::summary_prompt;
use crate::tier::{SummaryTier, Tiered};
use tracing::info;

/// Generate one tier's summary. Any failure is fatal.
pub async fn summarize_tier(
    backend: &dyn ModelBackend,
    document: &StagedFile,
    tier: SummaryTier,
    context: Option<&str>,
    reattach_document: bool,
) -> StageOutcome<String> {
    let stage = Stage::Summary(tier);
    let mut parts = vec![ContentPart::text(summary_prompt(tier, context))];
    if tier.source_tier().is_none() || reattach_document {
        parts.push(ContentPart::File(document.clone()));
    }

    let raw = match backend.generate(&parts).await {
        Ok(raw) => raw,
        Err(source) => {
            return StageOutcome::Fatal(Paper2PostError::GenerationFailed { stage, source })
        }
    };

    let summary = clean_summary(&raw);
    if summary.is_empty() {
        return StageOutcome::Fatal(Paper2PostError::GenerationFailed {
            stage,
            source: ModelError::EmptyResponse,
        });
    }
    info!("{} length: {} characters", stage, summary.chars().count());
    StageOutcome::Ok(summary)
}

/// Generate all three tiers in derivation order.
pub async fn summarize_tiers(
    backend: &dyn ModelBackend,
    document: &StagedFile,
    reattach_document: bool,
    progress: &dyn PipelineProgressCallback,
) -> Result<Tiered<String>, Paper2PostError> {
    let mut summaries = Tiered::<String>::default();

    for tier in SummaryTier::GENERATION_ORDER {
        let stage = Stage::Summary(tier);
        progress.on_stage_start(stage);

        let context = tier.source_tier().map(|t| summaries.get(t).as_str());
        let (summary, _) = summarize_tier(backend, document, tier, context, reattach_document)
            .await
            .into_result(stage)?;

        *summaries.get_mut(tier) = summary;
        progress.on_stage_complete(stage);
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileStager, ScriptedModel};
    use crate::progress::NoopProgressCallback;

    const UNI: &str = "Transformers replace recurrence with self-attention. BLEU 28.4.";
    const HS: &str = "A new kind of AI model reads whole sentences at once.";
    const CHILD: &str = "Computers learned to pay attention, like you in class!";

    async fn staged(model: &ScriptedModel) -> (tempfile::TempDir, StagedFile) {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let file = model.upload(&pdf).await.unwrap();
        (dir, file)
    }

    fn scripted() -> ScriptedModel {
        ScriptedModel::new("unexpected")
            .reply_when("ages 8-12", CHILD)
            .reply_when("16-18 year olds", HS)
            .reply_when("university/college level", UNI)
    }

    #[tokio::test]
    async fn tiers_derive_from_each_other() {
        let model = scripted();
        let (_dir, doc) = staged(&model).await;

        let summaries = summarize_tiers(&model, &doc, true, &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(summaries.university, UNI);
        assert_eq!(summaries.high_school, HS);
        assert_eq!(summaries.child, CHILD);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("university/college level"));
        assert!(prompts[1].contains(&format!("Advanced Summary: {UNI}")));
        assert!(prompts[2].contains(&format!("High School Summary: {HS}")));
    }

    #[tokio::test]
    async fn document_only_attached_to_university_without_reattach() {
        let model = scripted();
        let (_dir, doc) = staged(&model).await;

        summarize_tiers(&model, &doc, false, &NoopProgressCallback)
            .await
            .unwrap();
        let file_counts: Vec<usize> = model
            .calls()
            .iter()
            .map(|parts| parts.iter().filter(|p| matches!(p, ContentPart::File(_))).count())
            .collect();
        assert_eq!(file_counts, vec![1, 0, 0]);
    }

    #[tokio::test]
    async fn failed_tier_aborts_the_chain() {
        let model = ScriptedModel::new(UNI).fail_when("16-18 year olds", "quota exceeded");
        let (_dir, doc) = staged(&model).await;

        let err = summarize_tiers(&model, &doc, true, &NoopProgressCallback)
            .await
            .unwrap_err();
        match err {
            Paper2PostError::GenerationFailed { stage, .. } => {
                assert_eq!(stage, Stage::Summary(SummaryTier::HighSchool))
            }
            other => panic!("unexpected error: {other}"),
        }
        // the child tier is never attempted
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn blank_summary_is_fatal() {
        let model = ScriptedModel::new("```\n\n```");
        let (_dir, doc) = staged(&model).await;

        let outcome = summarize_tier(&model, &doc, SummaryTier::University, None, true).await;
        assert!(matches!(outcome, StageOutcome::Fatal(_)));
    }
}
