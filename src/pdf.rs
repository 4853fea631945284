//! PDF access via pdfium: embedded images and page rasters.
//!
//! pdfium is a C++ library with thread-local state, so every function here
//! is blocking; async callers wrap them in `tokio::task::spawn_blocking`.

use crate::error::Paper2PostError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An image object found on a page, before any relevance filtering.
pub struct EmbeddedImage {
    /// 1-based page number.
    pub page: usize,
    /// Position among the image objects of that page, 0-based.
    pub index: usize,
    pub image: DynamicImage,
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` may name either the library file or the directory
/// holding it; otherwise the system library search path is used.
pub fn bind_pdfium() -> Result<Pdfium, Paper2PostError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path
            };
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Paper2PostError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn load<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, Paper2PostError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Paper2PostError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// Decode every image object on every page, in page order then object order.
///
/// Images pdfium cannot decode are skipped but still consume an index, so
/// `(page, index)` stays stable regardless of decode failures.
pub fn extract_embedded_images(pdf_path: &Path) -> Result<Vec<EmbeddedImage>, Paper2PostError> {
    let pdfium = bind_pdfium()?;
    let document = load(&pdfium, pdf_path)?;

    let mut images = Vec::new();
    for (page_idx, page) in document.pages().iter().enumerate() {
        let page_num = page_idx + 1;
        let mut index = 0usize;

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let this_index = index;
            index += 1;

            match image_object.get_raw_image() {
                Ok(image) => images.push(EmbeddedImage {
                    page: page_num,
                    index: this_index,
                    image,
                }),
                Err(e) => warn!(
                    "Page {}: image {} could not be decoded: {:?}",
                    page_num, this_index, e
                ),
            }
        }
        debug!("Page {}: {} image objects", page_num, index);
    }

    info!("Found {} decodable images in {}", images.len(), pdf_path.display());
    Ok(images)
}

/// Rasterise the first `max_pages` pages, capping the longest edge at `max_pixels`.
pub fn rasterise_pages(
    pdf_path: &Path,
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, Paper2PostError> {
    let pdfium = bind_pdfium()?;
    let document = load(&pdfium, pdf_path)?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::new();
    for (idx, page) in document.pages().iter().enumerate().take(max_pages) {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Paper2PostError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(image);
    }

    Ok(results)
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}
