//! Pipeline stages for the file → document → page → image → upload sequence.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. the rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ render ──▶ capture ──▶ upload
//! (path/URL)  (pdfium)   (pdfium)   (data URI)  (relay)
//! ```
//!
//! 1. [`input`]    — resolve the user-supplied path or URL to a [`input::SourceFile`]
//! 2. [`document`] — open the file via pdfium and take its page count; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`render`]   — rasterise one 1-based page at its natural viewport size
//! 4. [`capture`]  — PNG-encode and base64-wrap the raster into a data URI
//! 5. [`upload`]   — POST the data URI to the upload relay; the only stage
//!    with network I/O on the client side

pub mod capture;
pub mod document;
pub mod input;
pub mod render;
pub mod upload;
