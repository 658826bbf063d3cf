//! Page rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Why natural viewport size?
//!
//! The raster surface is sized exactly to the page's own dimensions at the
//! requested scale (1.0 by default: one pixel per PDF point). The captured
//! image therefore matches what the document declares for the page, with no
//! resampling surprises between documents of different page sizes.

use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::pipeline::document::{self, LoadedDocument};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

/// Rasterise one 1-based page of a loaded document.
///
/// This runs inside `spawn_blocking` since pdfium operations are CPU-bound.
///
/// # Errors
/// [`SnapshotError::PageOutOfRange`] when `page` is 0 or greater than the
/// document's page count; [`SnapshotError::RenderFailed`] when pdfium cannot
/// rasterise the page.
pub async fn render_page(
    document: &LoadedDocument,
    page: usize,
    config: &SnapshotConfig,
) -> Result<DynamicImage, SnapshotError> {
    let path = document.path().to_path_buf();
    let total = document.page_count();
    let password = document.password().map(|s| s.to_string());
    let scale = config.scale;

    tokio::task::spawn_blocking(move || render_blocking(&path, password, total, page, scale))
        .await
        .map_err(|e| SnapshotError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_blocking(
    path: &Path,
    password: Option<String>,
    total: usize,
    page: usize,
    scale: f32,
) -> Result<DynamicImage, SnapshotError> {
    if page < 1 || page > total {
        return Err(SnapshotError::PageOutOfRange { page, total });
    }

    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(path, password.as_deref())
        .map_err(|e| document::map_open_error(e, path, password.is_some()))?;

    let pages = document.pages();
    let pdf_page = pages
        .get((page - 1) as u16)
        .map_err(|e| SnapshotError::RenderFailed {
            page,
            detail: format!("{:?}", e),
        })?;

    // Natural viewport dimensions at the requested scale.
    let width = (pdf_page.width().value * scale).round().max(1.0) as i32;
    let height = (pdf_page.height().value * scale).round().max(1.0) as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_maximum_height(height);

    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| SnapshotError::RenderFailed {
            page,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {}/{} → {}x{} px",
        page,
        total,
        image.width(),
        image.height()
    );

    Ok(image)
}
