//! Translator: each tier into the target language, in its own register.
//!
//! Unlike generation, translation has no cross-tier dependency; every tier
//! is translated from its own English text alone.

use super::postprocess::clean_summary;
use crate::error::{ModelError, Paper2PostError};
use crate::model::{ContentPart, GenerativeModel};
use crate::outcome::{Stage, StageOutcome};
use crate::progress::PipelineProgressCallback;
use crate::prompts::translation_prompt;
use crate::tier::{SummaryTier, Tiered};
use tracing::info;

/// Translate one tier's summary. Any failure is fatal.
pub async fn translate_tier(
    model: &dyn GenerativeModel,
    tier: SummaryTier,
    text: &str,
    language: &str,
) -> StageOutcome<String> {
    let stage = Stage::Translation(tier);
    let parts = [ContentPart::text(translation_prompt(tier, text, language))];

    match model.generate(&parts).await.map(|raw| clean_summary(&raw)) {
        Ok(translated) if !translated.is_empty() => {
            info!("{} length: {} characters", stage, translated.chars().count());
            StageOutcome::Ok(translated)
        }
        Ok(_) => StageOutcome::Fatal(Paper2PostError::GenerationFailed {
            stage,
            source: ModelError::EmptyResponse,
        }),
        Err(source) => StageOutcome::Fatal(Paper2PostError::GenerationFailed { stage, source }),
    }
}

/// Translate all three tiers, university first.
pub async fn translate_tiers(
    model: &dyn GenerativeModel,
    summaries: &Tiered<String>,
    language: &str,
    progress: &dyn PipelineProgressCallback,
) -> Result<Tiered<String>, Paper2PostError> {
    let mut translated = Tiered::<String>::default();

    for tier in SummaryTier::GENERATION_ORDER {
        let stage = Stage::Translation(tier);
        progress.on_stage_start(stage);
        let (text, _) = translate_tier(model, tier, summaries.get(tier), language)
            .await
            .into_result(stage)?;
        *translated.get_mut(tier) = text;
        progress.on_stage_complete(stage);
    }

    Ok(translated)
}
