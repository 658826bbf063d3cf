//! Error types for the pagesnap library.
//!
//! Two distinct error types reflect the two halves of the system:
//!
//! * [`SnapshotError`] — everything the page-conversion pipeline can report:
//!   input resolution, document parsing, page rendering, image capture, and
//!   the client side of the upload. Returned as `Err(SnapshotError)` from the
//!   session and pipeline functions.
//!
//! * [`StorageError`] — failures of the outbound storage-service call made by
//!   the upload relay. The relay collapses every variant into a generic
//!   HTTP 500 at its boundary so internal service errors never leak to the
//!   caller; the specific variant is logged server-side only.
//!
//! The pipeline additionally records a [`SessionFault`] on the session for
//! each failure class so callers have a visible error state to surface,
//! rather than failures disappearing into the log.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the page-conversion pipeline.
#[derive(Debug, Error)]
pub enum SnapshotError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// pdfium could not open the document (corrupt header, truncated file,
    /// unsupported format).
    #[error("Could not open PDF '{path}': {detail}")]
    ParseFailed { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Render errors ─────────────────────────────────────────────────────
    /// Requested page number is outside [1, page_count].
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium returned an error while rasterising a page.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The rasterised page could not be PNG-encoded.
    #[error("Capture failed for page {page}: {detail}")]
    CaptureFailed { page: usize, detail: String },

    // ── Session preconditions ─────────────────────────────────────────────
    /// convert() was called before any file was selected.
    #[error("No file selected — call select_file() first")]
    NoSourceFile,

    /// upload() was called before any page render completed.
    #[error("No rendered page to upload — convert and render a page first")]
    NoRenderedImage,

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The relay endpoint could not be reached (network failure, timeout).
    /// A reachable relay that answers non-2xx is not an error: it surfaces
    /// as [`crate::pipeline::upload::UploadResponse::Rejected`].
    #[error("Could not reach upload relay at '{url}': {reason}")]
    RelayUnreachable { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or loader validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_DYNAMIC_LIB_PATH to the directory containing libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the outbound storage-service call made by the upload relay.
///
/// Never serialised into an HTTP response: the relay handler logs the variant
/// and answers with a generic 500 body.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage endpoint could not be reached.
    #[error("storage transport error: {reason}")]
    Transport { reason: String },

    /// The storage service answered with a non-success status
    /// (bad credentials, quota exceeded, payload rejected).
    #[error("storage service rejected upload (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The storage service answered 2xx but the body was not the expected
    /// JSON shape.
    #[error("storage service returned an unparseable response")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },
}

/// A visible per-session error state, one per failure class of the pipeline.
///
/// Recorded by [`crate::session::PageSession`] whenever an operation fails so
/// callers can render an error banner instead of relying on log output. The
/// fault is cleared when a new file is selected or a later render succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFault {
    /// The selected file could not be opened as a document.
    #[error("document could not be opened: {0}")]
    Parse(String),

    /// The requested page could not be rendered or captured.
    #[error("page could not be rendered: {0}")]
    Render(String),

    /// The upload was not accepted by the relay.
    #[error("upload failed: {0}")]
    Upload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_out_of_range_display() {
        let e = SnapshotError::PageOutOfRange { page: 7, total: 3 };
        let msg = e.to_string();
        assert!(msg.contains("Page 7"), "got: {msg}");
        assert!(msg.contains("3 pages"), "got: {msg}");
    }

    #[test]
    fn relay_unreachable_display() {
        let e = SnapshotError::RelayUnreachable {
            url: "http://127.0.0.1:8080/api/upload".into(),
            reason: "connection refused".into(),
        };
        assert!(e.to_string().contains("http://127.0.0.1:8080/api/upload"));
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn not_a_pdf_display_includes_path() {
        let e = SnapshotError::NotAPdf {
            path: PathBuf::from("/tmp/x.bin"),
            magic: *b"PK\x03\x04",
        };
        assert!(e.to_string().contains("/tmp/x.bin"));
    }

    #[test]
    fn storage_rejected_display() {
        let e = StorageError::Rejected {
            status: 401,
            body: "invalid api key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert!(e.to_string().contains("invalid api key"));
    }

    #[test]
    fn session_fault_display() {
        let f = SessionFault::Render("Page 9 is out of range".into());
        assert!(f.to_string().contains("rendered"));
        assert!(f.to_string().contains("out of range"));
    }
}
