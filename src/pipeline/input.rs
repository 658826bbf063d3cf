//! Input resolution: normalise a user-supplied path, URL, or byte buffer to
//! a [`SourceFile`].
//!
//! ## Why a file on disk?
//!
//! pdfium requires a file-system path — it cannot stream from a byte buffer.
//! URL and in-memory inputs are written to a `TempDir` whose lifetime is tied
//! to the `SourceFile`, so cleanup happens automatically when the file is
//! replaced or the session ends, even if the process panics. We validate the
//! PDF magic bytes (`%PDF`) before returning so callers get a meaningful
//! error rather than a pdfium crash.

use crate::error::SnapshotError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The user-selected file: bytes on disk plus a display name.
///
/// Replaced wholesale when the user picks a new file; never mutated.
pub struct SourceFile {
    path: PathBuf,
    name: String,
    // Keeps a downloaded or in-memory file alive until the SourceFile drops.
    _temp_dir: Option<TempDir>,
}

impl SourceFile {
    /// Path to the PDF bytes regardless of how the file was resolved.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name (file name component, or the last URL segment).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type. Always `application/pdf`; enforced by the
    /// magic-byte check at resolution time.
    pub fn media_type(&self) -> &'static str {
        "application/pdf"
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a [`SourceFile`].
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve(input: &str, timeout_secs: u64) -> Result<SourceFile, SnapshotError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Wrap in-memory PDF bytes as a [`SourceFile`].
///
/// Writes the bytes to a managed temp directory so pdfium has a path to open.
pub fn from_bytes(bytes: &[u8], name: &str) -> Result<SourceFile, SnapshotError> {
    let temp_dir = TempDir::new().map_err(|e| SnapshotError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(name);

    check_magic(bytes, &path)?;

    std::fs::write(&path, bytes)
        .map_err(|e| SnapshotError::Internal(format!("Failed to write temp file: {}", e)))?;

    Ok(SourceFile {
        path,
        name: name.to_string(),
        _temp_dir: Some(temp_dir),
    })
}

/// Resolve a local file path, validating existence and PDF magic bytes.
fn resolve_local(path_str: &str) -> Result<SourceFile, SnapshotError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(SnapshotError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(f) => {
            use std::io::Read;
            // A file shorter than the magic is just as much not-a-PDF as one
            // with the wrong bytes; check_magic handles both.
            let mut head = Vec::with_capacity(4);
            if f.take(4).read_to_end(&mut head).is_err() {
                head.clear();
            }
            check_magic(&head, &path)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SnapshotError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SnapshotError::FileNotFound { path });
        }
    }

    let name = display_name(&path);
    debug!("Resolved local PDF: {}", path.display());
    Ok(SourceFile {
        path,
        name,
        _temp_dir: None,
    })
}

/// Download a URL to a temporary directory and return the resolved file.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, SnapshotError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SnapshotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SnapshotError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SnapshotError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(SnapshotError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| SnapshotError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SnapshotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SnapshotError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(SourceFile {
        path: file_path,
        name: filename,
        _temp_dir: Some(temp_dir),
    })
}

/// Verify the `%PDF` magic bytes.
fn check_magic(bytes: &[u8], path: &Path) -> Result<(), SnapshotError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(SnapshotError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Extract a reasonable filename from the URL.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn resolve_missing_file_is_not_found() {
        let result = resolve("/definitely/not/a/real/file.pdf", 5).await;
        assert!(matches!(result, Err(SnapshotError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn resolve_rejects_non_pdf_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04not a pdf").unwrap();

        let result = resolve(&tmp.path().to_string_lossy(), 5).await;
        assert!(matches!(result, Err(SnapshotError::NotAPdf { .. })));
    }

    #[tokio::test]
    async fn resolve_rejects_a_file_shorter_than_the_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();

        let result = resolve(&tmp.path().to_string_lossy(), 5).await;
        assert!(matches!(result, Err(SnapshotError::NotAPdf { .. })));
    }

    #[tokio::test]
    async fn resolve_accepts_pdf_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%stub").unwrap();

        let source = resolve(&tmp.path().to_string_lossy(), 5).await.unwrap();
        assert_eq!(source.media_type(), "application/pdf");
        assert!(source.path().exists());
    }

    #[test]
    fn from_bytes_keeps_name_and_magic_check() {
        let source = from_bytes(b"%PDF-1.4\n", "inline.pdf").unwrap();
        assert_eq!(source.name(), "inline.pdf");
        assert!(source.path().exists());

        let result = from_bytes(b"\xffnope", "bad.pdf");
        assert!(matches!(result, Err(SnapshotError::NotAPdf { .. })));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/papers/doc.pdf"),
            "doc.pdf"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.pdf");
    }
}
