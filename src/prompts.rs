//! Prompts for every model call the pipeline makes.
//!
//! Every prompt is either a constant or a small pure function of its inputs,
//! so tests can assert on exactly what the model will see without calling
//! one. In particular the derived tiers are checked here: the high-school
//! prompt must carry the university summary verbatim and the child prompt the
//! high-school summary verbatim.

use crate::tier::{SummaryTier, Tiered};

/// Sentinel the model is told to return when the paper carries no date.
pub const DATE_NOT_FOUND: &str = "NOT_FOUND";

pub const TITLE_PROMPT: &str =
    "Extract the title of this research paper. Return only the title, nothing else:";

pub const AUTHORS_PROMPT: &str = "Extract the authors of this research paper. \
Return only the authors' names separated by commas, nothing else:";

pub const DATE_PROMPT: &str = r#"Extract the publication date or submission date from this arXiv paper.
Look for dates in formats like:
- "Submitted on 15 Mar 2024"
- "v1 [cs.AI] 15 Mar 2024"
- Any date mentioned in the paper header or metadata

Return only the date in YYYY-MM-DD format, nothing else. If no date is found, return "NOT_FOUND"."#;

/// Build the generation prompt for `tier`.
///
/// `context` is the text of the tier this one derives from
/// ([`SummaryTier::source_tier`]); it is ignored for the university tier,
/// which is summarised from the paper itself.
pub fn summary_prompt(tier: SummaryTier, context: Option<&str>) -> String {
    match tier {
        SummaryTier::University => r#"You are a research paper summarizer. Create a comprehensive summary of this research paper for university/college level students.

Requirements:
- Focus on key concepts, methodologies, and findings
- Include the research question, methodology, main results, and implications
- Use academic language appropriate for university students
- Be thorough but concise (aim for 300-500 words)
- Write in English initially

Summarize this research paper:"#
            .to_string(),
        SummaryTier::HighSchool => format!(
            r#"You are a research paper summarizer. Based on the following advanced summary, create a summary suitable for high school students.

Requirements:
- Simplify complex terms and concepts
- Focus on the main ideas and their real-world implications
- Use language appropriate for 16-18 year olds
- Make it engaging and relatable
- Be concise (aim for 200-300 words)
- Write in English initially

Advanced Summary: {}

Create a high school level summary:"#,
            context.unwrap_or_default()
        ),
        SummaryTier::Child => format!(
            r#"You are a research paper summarizer. Based on the following high school summary, create a very simple summary for children (ages 8-12).

Requirements:
- Use very simple language and short sentences
- Include analogies and examples children can understand
- Focus on why this research matters in everyday life
- Make it fun and engaging
- Be brief (aim for 100-150 words)
- Write in English initially

High School Summary: {}

Create a child-friendly summary:"#,
            context.unwrap_or_default()
        ),
    }
}

/// Build the prompt translating one tier's summary into `language`,
/// keeping the register of that tier.
pub fn translation_prompt(tier: SummaryTier, text: &str, language: &str) -> String {
    let register = match tier {
        SummaryTier::University => format!(
            "Translate the following academic summary to {language}. \
Maintain the academic tone and technical accuracy.\n\
Use {language} academic terminology where appropriate."
        ),
        SummaryTier::HighSchool => format!(
            "Translate the following high school level summary to {language}. \
Maintain the appropriate language level for teenagers reading {language}.\n\
Use {language} terminology that high school students would understand."
        ),
        SummaryTier::Child => format!(
            "Translate the following child-friendly summary to {language}. \
Use simple {language} that children would understand.\n\
Keep the fun and engaging tone. Use words and expressions that are familiar to children."
        ),
    };
    format!("{register}\n\nText to translate: {text}")
}

/// Build the quality-review prompt over the three final summaries.
///
/// `language` names the language the summaries are written in.
pub fn review_prompt(summaries: &Tiered<String>, language: &str) -> String {
    format!(
        r#"You are a quality reviewer for {language} academic summaries. Review the following three {language} summaries of the same research paper and assess:

1. Do they accurately reflect the content and findings of the original paper?
2. Are they appropriate for their target audiences (university, high school, children)?
3. Is the {language} language natural and correct?
4. Are there any important details missing or misrepresented?
5. Do they maintain consistency in key facts across all three levels?

Original Paper Context: [You have access to the full paper]

Advanced Summary ({language}): {university}

High School Summary ({language}): {high_school}

Child Summary ({language}): {child}

Provide a brief assessment and any recommended improvements. If the summaries are satisfactory, simply state "Summaries are accurate and appropriate for their target audiences.""#,
        university = summaries.university,
        high_school = summaries.high_school,
        child = summaries.child,
    )
}

/// Build the prompt asking the model to pick one figure for `tier`.
pub fn figure_selection_prompt(tier: SummaryTier, summary: &str) -> String {
    format!(
        r#"You are analyzing figures from a research paper to select the most appropriate one for a specific audience level.

Target Audience: {audience}
Summary Text: {summary}

I will show you several figures from the paper. Please:
1. Analyze each figure for its relevance to the summary content
2. Consider the complexity level appropriate for the target audience:
   - Child: Simple, visual, easy to understand diagrams or photos
   - High School: Moderately complex charts, clear illustrations
   - University: Complex graphs, technical diagrams, detailed visualizations
3. Select the MOST appropriate figure, or respond with "NONE" if no figure is suitable

Respond with only the figure number (e.g., "Figure 1") or "NONE"."#,
        audience = tier.as_str(),
    )
}

/// Label placed before the `n`-th candidate figure (1-based).
pub fn figure_label(n: usize) -> String {
    format!("Figure {n}:")
}
