//! Image capture: `DynamicImage` → base64 PNG wrapped in a data URI.
//!
//! The relay and the storage service both consume the rendered page as a
//! `data:image/png;base64,…` string embedded in a JSON body. PNG is chosen
//! over JPEG because it is lossless — rendered text stays crisp, and the
//! encoding is deterministic, so capturing the same raster twice yields
//! bit-identical output.

use crate::error::SnapshotError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// A captured snapshot of one rendered page.
///
/// Overwritten wholesale whenever a newer render commits; never partially
/// updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    /// 1-based page number this snapshot was rendered from.
    pub page: usize,
    /// Pixel width of the raster surface.
    pub width: u32,
    /// Pixel height of the raster surface.
    pub height: u32,
    /// `data:image/png;base64,…` encoding of the raster surface.
    pub data_uri: String,
}

/// Capture a rasterised page as a PNG data URI.
pub fn capture_page(page: usize, img: &DynamicImage) -> Result<RenderedImage, SnapshotError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| SnapshotError::CaptureFailed {
            page,
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Captured page {} → {} bytes base64", page, b64.len());

    Ok(RenderedImage {
        page,
        width: img.width(),
        height: img.height(),
        data_uri: format!("data:image/png;base64,{}", b64),
    })
}

impl RenderedImage {
    /// Decode the PNG payload of the data URI back into raw bytes.
    ///
    /// Used by the CLI to write a snapshot to disk.
    pub fn png_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let b64 = self
            .data_uri
            .strip_prefix("data:image/png;base64,")
            .ok_or_else(|| SnapshotError::Internal("not a PNG data URI".into()))?;
        STANDARD
            .decode(b64)
            .map_err(|e| SnapshotError::Internal(format!("invalid base64 payload: {}", e)))
    }
}
