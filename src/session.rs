//! The page-conversion session: file → document → page → image → upload.
//!
//! [`PageSession`] owns the UI-facing state of one conversion session
//! (selected file, loaded document, page selector, latest snapshot) and keeps
//! it consistent with the latest user action. The machine is re-entrant:
//! selecting a new file restarts it.
//!
//! ```text
//! NoFile ─▶ FileSelected ─▶ DocumentLoaded ─▶ PageRendered ─▶ (upload)
//!              ▲   │ convert() can fail back (parse error)
//!              └───┘
//! ```
//!
//! ## Render dispatch and the ordering race
//!
//! Renders are not performed inline by `set_page`. Instead, `set_page` and
//! document-load completion emit render-request events into a channel
//! consumed by a single dispatch task. Each request carries a generation
//! token; the session bumps the generation whenever the desired output
//! changes. The dispatch task coalesces queued requests to the newest and
//! commits a finished snapshot only if its generation is still current, so a
//! slow render of page 2 can never overwrite a faster render of page 3 that
//! the user asked for later.
//!
//! ## Failure visibility
//!
//! Every failure class records a [`SessionFault`] on the session
//! (parse/render/upload) so callers have an explicit error state to surface.
//! A failed render leaves the previous snapshot untouched.

use crate::config::SnapshotConfig;
use crate::error::{SessionFault, SnapshotError};
use crate::pipeline::capture::{self, RenderedImage};
use crate::pipeline::document::{self, LoadedDocument};
use crate::pipeline::input::{self, SourceFile};
use crate::pipeline::render;
use crate::pipeline::upload::{RelayClient, UploadResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Seam between the session and the document-rendering collaborator.
///
/// The production implementation is [`PdfiumBackend`]; tests drive the
/// session with stub backends to exercise ordering and failure paths without
/// a pdfium library present.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Parse a source file and report its page count.
    async fn open(
        &self,
        source: &SourceFile,
        password: Option<&str>,
    ) -> Result<LoadedDocument, SnapshotError>;

    /// Rasterise one 1-based page and capture it as a data URI.
    async fn render(
        &self,
        document: &LoadedDocument,
        page: usize,
        config: &SnapshotConfig,
    ) -> Result<RenderedImage, SnapshotError>;
}

/// Production backend: pdfium for parsing/rasterisation, PNG data URIs for
/// capture.
pub struct PdfiumBackend;

#[async_trait]
impl DocumentBackend for PdfiumBackend {
    async fn open(
        &self,
        source: &SourceFile,
        password: Option<&str>,
    ) -> Result<LoadedDocument, SnapshotError> {
        document::open_document(source, password).await
    }

    async fn render(
        &self,
        document: &LoadedDocument,
        page: usize,
        config: &SnapshotConfig,
    ) -> Result<RenderedImage, SnapshotError> {
        let img = render::render_page(document, page, config).await?;
        capture::capture_page(page, &img)
    }
}

/// Where the session currently is in the conversion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoFile,
    FileSelected,
    DocumentLoaded,
    PageRendered,
}

struct RenderRequest {
    page: usize,
    generation: u64,
}

struct SessionState {
    source: Option<Arc<SourceFile>>,
    document: Option<LoadedDocument>,
    /// PageSelector: 1-based. The upper bound is intentionally not enforced
    /// here; out-of-range values fail at the render step.
    page: usize,
    rendered: Option<RenderedImage>,
    fault: Option<SessionFault>,
}

/// One page-conversion session. See the module docs for the state machine.
///
/// Must be created inside a Tokio runtime (the render dispatch task is
/// spawned at construction). Dropping the session shuts the dispatch task
/// down.
pub struct PageSession {
    config: SnapshotConfig,
    backend: Arc<dyn DocumentBackend>,
    relay: RelayClient,
    state: Arc<Mutex<SessionState>>,
    /// Current desired output. Bumped whenever the file or page changes.
    generation: Arc<AtomicU64>,
    /// Highest generation actually submitted as a render request.
    requested: Arc<AtomicU64>,
    render_tx: mpsc::UnboundedSender<RenderRequest>,
    processed_rx: watch::Receiver<u64>,
}

impl PageSession {
    /// Create a session backed by pdfium.
    pub fn new(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        Self::with_backend(config, Arc::new(PdfiumBackend))
    }

    /// Create a session with an alternative [`DocumentBackend`].
    pub fn with_backend(
        config: SnapshotConfig,
        backend: Arc<dyn DocumentBackend>,
    ) -> Result<Self, SnapshotError> {
        let relay = RelayClient::new(&config)?;
        let state = Arc::new(Mutex::new(SessionState {
            source: None,
            document: None,
            page: 1,
            rendered: None,
            fault: None,
        }));
        let generation = Arc::new(AtomicU64::new(0));
        let (render_tx, render_rx) = mpsc::unbounded_channel();
        let (processed_tx, processed_rx) = watch::channel(0u64);

        tokio::spawn(run_render_dispatch(
            render_rx,
            processed_tx,
            Arc::clone(&state),
            Arc::clone(&backend),
            config.clone(),
            Arc::clone(&generation),
        ));

        Ok(Self {
            config,
            backend,
            relay,
            state,
            generation,
            requested: Arc::new(AtomicU64::new(0)),
            render_tx,
            processed_rx,
        })
    }

    // ── Operations ────────────────────────────────────────────────────────

    /// Select a file by local path or HTTP(S) URL.
    ///
    /// Replaces the previous SourceFile and clears the loaded document, the
    /// snapshot, and any recorded fault. The page selector resets to 1.
    pub async fn select_file(&self, input: &str) -> Result<(), SnapshotError> {
        let source = input::resolve(input, self.config.download_timeout_secs).await?;
        self.install_source(source);
        Ok(())
    }

    /// Select in-memory PDF bytes.
    pub fn select_bytes(&self, bytes: &[u8], name: &str) -> Result<(), SnapshotError> {
        let source = input::from_bytes(bytes, name)?;
        self.install_source(source);
        Ok(())
    }

    fn install_source(&self, source: SourceFile) {
        // Invalidate any in-flight render of the previous document before
        // the old state goes away.
        self.generation.fetch_add(1, Ordering::SeqCst);

        info!("Selected file: {}", source.name());
        let mut s = self.lock();
        s.source = Some(Arc::new(source));
        s.document = None;
        s.rendered = None;
        s.fault = None;
        s.page = 1;
    }

    /// Open the selected file as a document.
    ///
    /// On success, installs the [`LoadedDocument`], returns its page count,
    /// and requests a render of the current page. On failure the session
    /// keeps its SourceFile and stays without a document, ready for a retry.
    pub async fn convert(&self) -> Result<usize, SnapshotError> {
        let source = self
            .lock()
            .source
            .clone()
            .ok_or(SnapshotError::NoSourceFile)?;

        match self
            .backend
            .open(&source, self.config.password.as_deref())
            .await
        {
            Ok(doc) => {
                let page_count = doc.page_count();
                info!("Document loaded: {} pages", page_count);
                let page = {
                    let mut s = self.lock();
                    s.document = Some(doc);
                    s.fault = None;
                    s.page
                };
                self.request_render(page);
                Ok(page_count)
            }
            Err(e) => {
                warn!("Document load failed: {}", e);
                self.lock().fault = Some(SessionFault::Parse(e.to_string()));
                Err(e)
            }
        }
    }

    /// Change the requested page and, if a document is loaded, request a
    /// render.
    ///
    /// No upper-bound validation happens here: an out-of-range page fails at
    /// the render step with a render fault, leaving the prior snapshot
    /// unchanged.
    pub fn set_page(&self, page: usize) {
        let has_document = {
            let mut s = self.lock();
            s.page = page;
            s.document.is_some()
        };
        if has_document {
            self.request_render(page);
        }
    }

    fn request_render(&self, page: usize) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested.fetch_max(generation, Ordering::SeqCst);
        debug!("Render requested: page {} (generation {})", page, generation);
        let _ = self.render_tx.send(RenderRequest { page, generation });
    }

    /// Upload the latest snapshot to the relay.
    ///
    /// Returns the typed relay response; a reachable relay that rejects the
    /// image comes back as [`UploadResponse::Rejected`] and is recorded as an
    /// upload fault. Never retried.
    pub async fn upload(&self) -> Result<UploadResponse, SnapshotError> {
        let image = self
            .lock()
            .rendered
            .clone()
            .ok_or(SnapshotError::NoRenderedImage)?;

        match self.relay.upload(&image).await {
            Ok(response) => {
                if let UploadResponse::Rejected { status, message } = &response {
                    self.lock().fault = Some(SessionFault::Upload(format!(
                        "HTTP {}: {}",
                        status, message
                    )));
                }
                Ok(response)
            }
            Err(e) => {
                self.lock().fault = Some(SessionFault::Upload(e.to_string()));
                Err(e)
            }
        }
    }

    /// Wait until every render request issued so far has been processed
    /// (committed, faulted, or superseded).
    pub async fn settled(&self) {
        let target = self.requested.load(Ordering::SeqCst);
        let mut rx = self.processed_rx.clone();
        let _ = rx.wait_for(|done| *done >= target).await;
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        let s = self.lock();
        if s.rendered.is_some() {
            SessionPhase::PageRendered
        } else if s.document.is_some() {
            SessionPhase::DocumentLoaded
        } else if s.source.is_some() {
            SessionPhase::FileSelected
        } else {
            SessionPhase::NoFile
        }
    }

    /// Display name of the selected file, if any.
    pub fn file_name(&self) -> Option<String> {
        self.lock().source.as_ref().map(|s| s.name().to_string())
    }

    /// Page count of the loaded document, if any.
    pub fn page_count(&self) -> Option<usize> {
        self.lock().document.as_ref().map(|d| d.page_count())
    }

    /// Currently requested 1-based page.
    pub fn current_page(&self) -> usize {
        self.lock().page
    }

    /// Latest committed snapshot, if any.
    pub fn rendered(&self) -> Option<RenderedImage> {
        self.lock().rendered.clone()
    }

    /// Latest recorded fault, if any.
    pub fn fault(&self) -> Option<SessionFault> {
        self.lock().fault.clone()
    }

    // No partial writes happen under this lock, so a poisoned guard still
    // holds consistent state.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The single render-dispatch loop: consume render requests, coalesce to the
/// newest, render, and commit only still-current results.
async fn run_render_dispatch(
    mut rx: mpsc::UnboundedReceiver<RenderRequest>,
    processed_tx: watch::Sender<u64>,
    state: Arc<Mutex<SessionState>>,
    backend: Arc<dyn DocumentBackend>,
    config: SnapshotConfig,
    generation: Arc<AtomicU64>,
) {
    while let Some(mut req) = rx.recv().await {
        // Coalesce everything already queued down to the highest generation.
        // Concurrent set_page callers can enqueue out of order (the counter
        // bump and the send are not one atomic step), so "last received" is
        // not necessarily newest.
        while let Ok(next) = rx.try_recv() {
            if next.generation > req.generation {
                req = next;
            }
        }

        if req.generation == generation.load(Ordering::SeqCst) {
            let document = lock_state(&state).document.clone();
            if let Some(document) = document {
                match backend.render(&document, req.page, &config).await {
                    Ok(image) => {
                        if req.generation == generation.load(Ordering::SeqCst) {
                            debug!(
                                "Committing snapshot: page {} ({}x{})",
                                image.page, image.width, image.height
                            );
                            let mut s = lock_state(&state);
                            s.rendered = Some(image);
                            s.fault = None;
                        } else {
                            debug!("Dropping superseded render of page {}", req.page);
                        }
                    }
                    Err(e) => {
                        if req.generation == generation.load(Ordering::SeqCst) {
                            warn!("Render failed for page {}: {}", req.page, e);
                            lock_state(&state).fault =
                                Some(SessionFault::Render(e.to_string()));
                        }
                    }
                }
            }
        }

        // Monotonic publish: a request arriving late must not regress the
        // watermark that settled() waits on.
        processed_tx.send_modify(|done| *done = (*done).max(req.generation));
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
