//! Figure Extractor: embedded raster images worth showing to a reader.
//!
//! ## Why a relevance filter?
//!
//! Papers embed plenty of images that are not figures: logos, icons,
//! equation snippets, decorative rules. Anything under `min_dimension` pixels
//! on either side is dropped, as are pixel layouts that do not survive a
//! plain PNG re-encode (CMYK-like four-colour buffers, float HDR buffers).
//!
//! Extraction is best-effort. Any failure, from binding pdfium to decoding
//! a page, yields an empty figure list and the post is written without
//! figures.

use crate::error::Paper2PostError;
use crate::model::{FileStager, StagedFile};
use crate::outcome::{Stage, StageIssue, StageOutcome};
use crate::pdf;
use image::ColorType;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A relevant embedded image, re-encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    /// `fig_<page>_<index>`.
    pub id: String,
    /// 1-based page number.
    pub page: usize,
    /// Position among the page's image objects, 0-based.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl Figure {
    pub fn new(page: usize, index: usize, width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            id: format!("fig_{page}_{index}"),
            page,
            index,
            width,
            height,
            png,
        }
    }
}

/// A figure that made it onto the staging service.
#[derive(Debug, Clone)]
pub struct UploadedFigure {
    pub figure: Figure,
    pub staged: StagedFile,
}

/// Channel layout of a decoded pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    /// Channels including alpha.
    pub channels: u8,
    pub has_alpha: bool,
    /// Floating-point samples.
    pub float: bool,
}

impl PixelLayout {
    pub fn of(color: ColorType) -> Self {
        Self {
            channels: color.channel_count(),
            has_alpha: color.has_alpha(),
            float: matches!(color, ColorType::Rgb32F | ColorType::Rgba32F),
        }
    }

    /// Channels carrying colour, i.e. excluding alpha.
    pub fn color_channels(&self) -> u8 {
        self.channels - u8::from(self.has_alpha)
    }
}

/// Whether an embedded image counts as a figure.
pub fn is_relevant(width: u32, height: u32, layout: PixelLayout, min_dimension: u32) -> bool {
    width >= min_dimension
        && height >= min_dimension
        && layout.color_channels() < 4
        && !layout.float
}

/// Where figures come from. The default reads embedded images with pdfium.
pub trait FigureSource: Send + Sync {
    /// All relevant figures, ordered by page then in-page index.
    fn extract(&self, pdf_path: &Path, min_dimension: u32) -> Result<Vec<Figure>, Paper2PostError>;
}

/// Extracts embedded images through pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumFigureSource;

impl FigureSource for PdfiumFigureSource {
    fn extract(&self, pdf_path: &Path, min_dimension: u32) -> Result<Vec<Figure>, Paper2PostError> {
        let mut figures = Vec::new();
        for embedded in pdf::extract_embedded_images(pdf_path)? {
            let (w, h) = (embedded.image.width(), embedded.image.height());
            let layout = PixelLayout::of(embedded.image.color());
            if !is_relevant(w, h, layout, min_dimension) {
                debug!(
                    "Skipping image {} on page {}: {}x{} {:?}",
                    embedded.index, embedded.page, w, h, layout
                );
                continue;
            }

            let png = match pdf::encode_png(&embedded.image) {
                Ok(png) => png,
                Err(e) => {
                    warn!(
                        "Skipping image {} on page {}: PNG encoding failed: {}",
                        embedded.index, embedded.page, e
                    );
                    continue;
                }
            };
            let figure = Figure::new(embedded.page, embedded.index, w, h, png);
            debug!("Extracted figure {}: {}x{}", figure.id, w, h);
            figures.push(figure);
        }
        Ok(figures)
    }
}

/// Run the figure source off the async runtime and swallow any failure.
pub async fn extract_figures(
    source: Arc<dyn FigureSource>,
    pdf_path: &Path,
    min_dimension: u32,
) -> StageOutcome<Vec<Figure>> {
    let path = pdf_path.to_path_buf();
    let joined =
        tokio::task::spawn_blocking(move || source.extract(&path, min_dimension)).await;

    match joined {
        Ok(Ok(figures)) => {
            info!("Total figures extracted: {}", figures.len());
            StageOutcome::Ok(figures)
        }
        Ok(Err(e)) => StageOutcome::degraded(Vec::new(), e.to_string()),
        Err(e) => StageOutcome::degraded(Vec::new(), format!("extraction task panicked: {e}")),
    }
}

/// Write each figure to `dir/<id>.png` and stage it.
///
/// Figures that fail to write or upload are left out and reported.
pub async fn stage_figures(
    stager: &dyn FileStager,
    figures: &[Figure],
    dir: &Path,
) -> (Vec<UploadedFigure>, Vec<StageIssue>) {
    let mut uploaded = Vec::with_capacity(figures.len());
    let mut issues = Vec::new();

    for figure in figures {
        let path: PathBuf = dir.join(format!("{}.png", figure.id));
        if let Err(e) = tokio::fs::write(&path, &figure.png).await {
            warn!("Failed to write {}: {}", path.display(), e);
            issues.push(StageIssue::new(
                Stage::FigureUpload,
                format!("{}: {e}", figure.id),
            ));
            continue;
        }

        match stager.upload(&path).await {
            Ok(staged) => {
                debug!("Uploaded figure {} as {}", figure.id, staged.name);
                uploaded.push(UploadedFigure {
                    figure: figure.clone(),
                    staged,
                });
            }
            Err(e) => {
                warn!("Failed to upload figure {}: {}", figure.id, e);
                issues.push(StageIssue::new(
                    Stage::FigureUpload,
                    format!("{}: {e}", figure.id),
                ));
            }
        }
    }

    info!("Uploaded {} of {} figures", uploaded.len(), figures.len());
    (uploaded, issues)
}
