//! Document opening: parse a [`SourceFile`] via pdfium and take its page count.
//!
//! A [`LoadedDocument`] is deliberately not a live pdfium handle. pdfium
//! documents borrow the library binding and are awkward to hold across await
//! points, so we open the file, read the page count, and drop the handle;
//! the render stage re-opens the file when it needs pixels. The struct is a
//! cheap, cloneable token that proves one successful parse happened.

use crate::error::SnapshotError;
use crate::pipeline::input::SourceFile;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// An opaque handle to a successfully parsed document.
///
/// Invariant: a `LoadedDocument` exists only after pdfium opened the file and
/// reported a page count. Parse failure produces an error, never a partial
/// handle.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    path: PathBuf,
    page_count: usize,
    password: Option<String>,
}

impl LoadedDocument {
    /// Construct a handle directly. Intended for alternative
    /// [`crate::session::DocumentBackend`] implementations; the pdfium path
    /// goes through [`open_document`].
    pub fn new(path: PathBuf, page_count: usize, password: Option<String>) -> Self {
        Self {
            path,
            page_count,
            password,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the document (≥ 1 for any openable PDF).
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// Open a source file as a document and read its page count.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound and not
/// async-safe.
pub async fn open_document(
    source: &SourceFile,
    password: Option<&str>,
) -> Result<LoadedDocument, SnapshotError> {
    let path = source.path().to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || open_blocking(&path, pwd))
        .await
        .map_err(|e| SnapshotError::Internal(format!("Document task panicked: {}", e)))?
}

/// Blocking implementation of document opening.
fn open_blocking(path: &Path, password: Option<String>) -> Result<LoadedDocument, SnapshotError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(path, password.as_deref())
        .map_err(|e| map_open_error(e, path, password.is_some()))?;

    let page_count = document.pages().len() as usize;
    info!("PDF loaded: {} pages", page_count);
    drop(document);

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        page_count,
        password,
    })
}

/// Classify a pdfium open failure into the parse-error taxonomy.
pub(crate) fn map_open_error(
    e: PdfiumError,
    path: &Path,
    password_given: bool,
) -> SnapshotError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password_given {
            SnapshotError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            SnapshotError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        SnapshotError::ParseFailed {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}
