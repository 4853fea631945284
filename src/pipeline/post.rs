//! Post Renderer: the Jekyll post, its figure assets and the CI sidecar.
//!
//! Rendering is pure: the same metadata, summaries and figures always give
//! byte-identical markdown. Only [`persist_figures`] can produce a
//! [`PersistedFigure`], so a post can only reference figure files that were
//! actually written.
//!
//! ```text
//! <output_root>/
//! ├── _posts/<date>-<paper>.markdown
//! ├── assets/papers/<paper>/{child,high_school,university}_fig.png
//! └── _paper_metadata.txt
//! ```

use super::figures::Figure;
use super::input::post_relative_path;
use super::metadata::PaperMetadata;
use crate::error::Paper2PostError;
use crate::outcome::{Stage, StageIssue};
use crate::tier::{SummaryTier, Tiered};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Front-matter layout of the generated post.
pub const POST_LAYOUT: &str = "tabbed_post";

/// Front-matter categories of the generated post.
pub const POST_CATEGORIES: &str = "ai forskning";

/// Sidecar file read by the CI workflow, relative to the output root.
pub const METADATA_FILE_NAME: &str = "_paper_metadata.txt";

/// Disk location of a tier's figure, relative to the output root.
pub fn figure_asset_path(paper_name: &str, tier: SummaryTier) -> PathBuf {
    Path::new("assets")
        .join("papers")
        .join(paper_name)
        .join(format!("{}_fig.png", tier.as_str()))
}

/// Site-absolute URL of a tier's figure.
pub fn figure_web_path(paper_name: &str, tier: SummaryTier) -> String {
    format!("/assets/papers/{}/{}_fig.png", paper_name, tier.as_str())
}

/// A figure written to the tier's asset path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedFigure {
    figure_id: String,
    disk_path: PathBuf,
    web_path: String,
}

impl PersistedFigure {
    pub fn figure_id(&self) -> &str {
        &self.figure_id
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    pub fn web_path(&self) -> &str {
        &self.web_path
    }
}

/// Everything the post is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PostInput<'a> {
    pub paper_name: &'a str,
    pub metadata: &'a PaperMetadata,
    pub summaries: &'a Tiered<String>,
    pub figures: &'a Tiered<Option<PersistedFigure>>,
}

/// A rendered post and where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPost {
    /// `_posts/<date>-<paper>.markdown`, relative to the output root.
    pub relative_path: PathBuf,
    pub content: String,
}

/// Quote a front-matter value. Line breaks would end the YAML scalar, so
/// they become spaces.
fn yaml_quoted(value: &str) -> String {
    let flat = value.split(['\r', '\n']).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");
    format!("\"{}\"", flat.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render the post markdown. Pure and deterministic.
pub fn render_post(input: &PostInput<'_>) -> RenderedPost {
    let meta = input.metadata;
    let timestamp = meta
        .date
        .and_hms_opt(12, 0, 0)
        .map(|dt| dt.and_utc().format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_default();

    let mut out = String::with_capacity(
        512 + input.summaries.child.len()
            + input.summaries.high_school.len()
            + input.summaries.university.len(),
    );
    out.push_str("---\n");
    let _ = writeln!(out, "layout: {POST_LAYOUT}");
    let _ = writeln!(out, "title: {}", yaml_quoted(&meta.title));
    let _ = writeln!(out, "paper_id: {}", yaml_quoted(input.paper_name));
    let _ = writeln!(out, "authors: {}", yaml_quoted(&meta.authors));
    let _ = writeln!(out, "date: {timestamp}");
    let _ = writeln!(out, "categories: {POST_CATEGORIES}");
    out.push_str("---\n");

    for tier in SummaryTier::POST_ORDER {
        let _ = write!(out, "\n## {}\n\n{}\n", tier.heading(), input.summaries.get(tier));
        if let Some(fig) = input.figures.get(tier) {
            let _ = write!(out, "\n![{}]({})\n", tier.figure_alt(), fig.web_path());
        }
    }

    RenderedPost {
        relative_path: post_relative_path(meta.date, input.paper_name),
        content: out,
    }
}

/// Write each selected figure to its tier's asset path.
///
/// Tiers whose figure could not be written are left without a figure.
pub async fn persist_figures(
    output_root: &Path,
    paper_name: &str,
    selected: &Tiered<Option<&Figure>>,
) -> (Tiered<Option<PersistedFigure>>, Vec<StageIssue>) {
    let mut persisted = Tiered::<Option<PersistedFigure>>::default();
    let mut issues = Vec::new();

    for tier in SummaryTier::POST_ORDER {
        let Some(figure) = selected.get(tier) else {
            continue;
        };
        let disk_path = output_root.join(figure_asset_path(paper_name, tier));

        let written = async {
            if let Some(parent) = disk_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&disk_path, &figure.png).await
        }
        .await;

        match written {
            Ok(()) => {
                debug!("Saved {} figure {} to {}", tier, figure.id, disk_path.display());
                *persisted.get_mut(tier) = Some(PersistedFigure {
                    figure_id: figure.id.clone(),
                    disk_path,
                    web_path: figure_web_path(paper_name, tier),
                });
            }
            Err(e) => {
                warn!("Failed to save {} figure to {}: {}", tier, disk_path.display(), e);
                issues.push(StageIssue::new(
                    Stage::FigurePersist,
                    format!("{tier}: {e}"),
                ));
            }
        }
    }

    (persisted, issues)
}

/// Write the post below `output_root`, creating `_posts/` if needed.
///
/// Uses atomic write (temp file + rename) to prevent partial posts.
pub async fn write_post(output_root: &Path, post: &RenderedPost) -> Result<PathBuf, Paper2PostError> {
    let path = output_root.join(&post.relative_path);
    let write_err = |source| Paper2PostError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("markdown.tmp");
    tokio::fs::write(&tmp_path, &post.content)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(write_err)?;

    info!("Wrote {} ({} bytes)", path.display(), post.content.len());
    Ok(path)
}

/// Render the four `KEY=value` lines of the CI sidecar.
pub fn render_metadata_sidecar(
    metadata: &PaperMetadata,
    paper_name: &str,
    post_relative_path: &Path,
) -> String {
    let one_line = |s: &str| s.split(['\r', '\n']).filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ");
    let post_path = post_relative_path.to_string_lossy().replace('\\', "/");
    format!(
        "PAPER_TITLE={}\nPAPER_AUTHORS={}\nPAPER_ID={}\nPOST_PATH={}\n",
        one_line(&metadata.title),
        one_line(&metadata.authors),
        one_line(paper_name),
        post_path,
    )
}

/// Write the CI sidecar to `<output_root>/_paper_metadata.txt`.
pub async fn write_metadata_sidecar(
    output_root: &Path,
    metadata: &PaperMetadata,
    paper_name: &str,
    post_relative_path: &Path,
) -> Result<PathBuf, Paper2PostError> {
    let path = output_root.join(METADATA_FILE_NAME);
    let content = render_metadata_sidecar(metadata, paper_name, post_relative_path);
    tokio::fs::write(&path, content)
        .await
        .map_err(|source| Paper2PostError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
    debug!("Wrote {}", path.display());
    Ok(path)
}
