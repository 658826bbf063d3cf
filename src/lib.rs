//! # pagesnap
//!
//! Render PDF pages to images and publish them to a media-storage service.
//!
//! ## What this crate does
//!
//! `pagesnap` drives a single page-conversion pipeline: a user-supplied PDF
//! is opened, one page at a time is rasterised at its natural viewport size,
//! the raster is captured as a base64 PNG data URI, and the capture is posted
//! to an upload relay that forwards it to an external media-storage service.
//! PDF decoding is delegated to pdfium; persistent storage is delegated to
//! the storage service. What lives here is the state wiring between them,
//! made explicit and race-free.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Document open via pdfium, take the page count (spawn_blocking)
//!  ├─ 3. Render   rasterise the selected page at scale 1.0
//!  ├─ 4. Capture  PNG → base64 data URI
//!  └─ 5. Upload   POST {"data": …} to the relay → storage service → {url, id}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagesnap::{PageSession, SnapshotConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = PageSession::new(SnapshotConfig::default())?;
//!     session.select_file("document.pdf").await?;
//!     let pages = session.convert().await?;
//!     println!("{pages} pages");
//!
//!     session.set_page(2);
//!     session.settled().await;
//!     let response = session.upload().await?;
//!     println!("{:?}", response);
//!     Ok(())
//! }
//! ```
//!
//! ## The ordering race, fixed
//!
//! Changing the page while a render is still in flight must never let the
//! older render win. [`PageSession`] routes all renders through a single
//! dispatch task and tags each request with a generation token; a finished
//! render commits only if its token is still current. See
//! [`crate::session`] for details.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagesnap` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pagesnap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod relay;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RelayConfig, SnapshotConfig, SnapshotConfigBuilder, StorageConfig};
pub use error::{SessionFault, SnapshotError, StorageError};
pub use pipeline::capture::RenderedImage;
pub use pipeline::document::LoadedDocument;
pub use pipeline::input::SourceFile;
pub use pipeline::upload::{UploadReceipt, UploadResponse};
pub use session::{DocumentBackend, PageSession, PdfiumBackend, SessionPhase};
