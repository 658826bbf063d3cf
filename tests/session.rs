//! Integration tests for the page-conversion session.
//!
//! Rendering is driven through a stub `DocumentBackend` so the state machine,
//! the render dispatch loop, and the ordering guarantees can be exercised
//! without a pdfium library present. The stub marks each snapshot's data URI
//! with its page number, making commit order observable.

use async_trait::async_trait;
use pagesnap::{
    DocumentBackend, LoadedDocument, PageSession, RenderedImage, SessionFault, SessionPhase,
    SnapshotConfig, SnapshotError, SourceFile, UploadResponse,
};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::sleep;

// ── Test helpers ─────────────────────────────────────────────────────────

/// Stub backend with a fixed page count and optional per-page render delays.
struct StubBackend {
    page_count: usize,
    delays_ms: HashMap<usize, u64>,
    fail_open: AtomicBool,
}

impl StubBackend {
    fn with_pages(page_count: usize) -> Arc<Self> {
        Arc::new(Self {
            page_count,
            delays_ms: HashMap::new(),
            fail_open: AtomicBool::new(false),
        })
    }

    fn with_delays(page_count: usize, delays_ms: &[(usize, u64)]) -> Arc<Self> {
        Arc::new(Self {
            page_count,
            delays_ms: delays_ms.iter().copied().collect(),
            fail_open: AtomicBool::new(false),
        })
    }

    fn failing_open(page_count: usize) -> Arc<Self> {
        Arc::new(Self {
            page_count,
            delays_ms: HashMap::new(),
            fail_open: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl DocumentBackend for StubBackend {
    async fn open(
        &self,
        source: &SourceFile,
        password: Option<&str>,
    ) -> Result<LoadedDocument, SnapshotError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SnapshotError::ParseFailed {
                path: source.path().to_path_buf(),
                detail: "stub parse failure".into(),
            });
        }
        Ok(LoadedDocument::new(
            source.path().to_path_buf(),
            self.page_count,
            password.map(|s| s.to_string()),
        ))
    }

    async fn render(
        &self,
        document: &LoadedDocument,
        page: usize,
        _config: &SnapshotConfig,
    ) -> Result<RenderedImage, SnapshotError> {
        if let Some(&ms) = self.delays_ms.get(&page) {
            sleep(Duration::from_millis(ms)).await;
        }
        if page < 1 || page > document.page_count() {
            return Err(SnapshotError::PageOutOfRange {
                page,
                total: document.page_count(),
            });
        }
        Ok(RenderedImage {
            page,
            width: 612,
            height: 792,
            data_uri: format!("data:image/png;base64,stub-page-{page}"),
        })
    }
}

/// A file on disk that passes the `%PDF` magic check.
fn stub_pdf() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(b"%PDF-1.7\n%stub document").unwrap();
    tmp
}

fn session(backend: Arc<StubBackend>) -> PageSession {
    PageSession::with_backend(SnapshotConfig::default(), backend).unwrap()
}

async fn load(session: &PageSession, file: &NamedTempFile) -> usize {
    session
        .select_file(&file.path().to_string_lossy())
        .await
        .unwrap();
    session.convert().await.unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn selecting_a_missing_file_is_file_not_found() {
    let session = session(StubBackend::with_pages(3));
    let err = session
        .select_file("/definitely/not/here.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::FileNotFound { .. }));
    assert_eq!(session.phase(), SessionPhase::NoFile);
}

#[tokio::test]
async fn convert_loads_document_and_renders_page_one() {
    let file = stub_pdf();
    let session = session(StubBackend::with_pages(5));

    let pages = load(&session, &file).await;
    assert_eq!(pages, 5);
    assert_eq!(session.page_count(), Some(5));

    session.settled().await;
    let image = session.rendered().unwrap();
    assert_eq!(image.page, 1);
    assert_eq!(session.phase(), SessionPhase::PageRendered);
    assert!(session.fault().is_none());
}

#[tokio::test]
async fn set_page_renders_the_requested_page() {
    let file = stub_pdf();
    let session = session(StubBackend::with_pages(5));
    load(&session, &file).await;

    session.set_page(4);
    session.settled().await;

    assert_eq!(session.current_page(), 4);
    assert_eq!(session.rendered().unwrap().page, 4);
}

#[tokio::test]
async fn out_of_range_page_faults_and_keeps_previous_snapshot() {
    let file = stub_pdf();
    let session = session(StubBackend::with_pages(5));
    load(&session, &file).await;
    session.settled().await;

    session.set_page(6);
    session.settled().await;

    assert!(matches!(session.fault(), Some(SessionFault::Render(_))));
    // The page-1 snapshot survives the failed render.
    assert_eq!(session.rendered().unwrap().page, 1);
    assert_eq!(session.phase(), SessionPhase::PageRendered);
}

#[tokio::test]
async fn page_zero_faults_like_any_out_of_range_page() {
    let file = stub_pdf();
    let session = session(StubBackend::with_pages(5));
    load(&session, &file).await;
    session.settled().await;

    session.set_page(0);
    session.settled().await;

    assert!(matches!(session.fault(), Some(SessionFault::Render(_))));
    assert_eq!(session.rendered().unwrap().page, 1);
}

#[tokio::test]
async fn newer_page_request_wins_over_a_slower_older_one() {
    let file = stub_pdf();
    // Page 2 renders slowly; page 3 is instant.
    let session = session(StubBackend::with_delays(5, &[(2, 300)]));
    load(&session, &file).await;
    session.settled().await;

    session.set_page(2);
    // Let the dispatch task start the slow page-2 render before superseding it.
    sleep(Duration::from_millis(50)).await;
    session.set_page(3);

    session.settled().await;
    assert_eq!(session.rendered().unwrap().page, 3);

    // The stale page-2 result must not surface later either.
    sleep(Duration::from_millis(400)).await;
    assert_eq!(session.rendered().unwrap().page, 3);
    assert!(session.fault().is_none());
}

#[tokio::test]
async fn concurrent_set_page_calls_never_wedge_settled() {
    let file = stub_pdf();
    let session = Arc::new(session(StubBackend::with_pages(9)));
    load(&session, &file).await;
    session.settled().await;

    // Interleave page changes from several tasks; the counter bump and the
    // channel send inside set_page are separate steps, so requests can reach
    // the dispatch task out of generation order.
    for _ in 0..20 {
        let mut handles = Vec::new();
        for page in 2..=9 {
            let s = Arc::clone(&session);
            handles.push(tokio::spawn(async move { s.set_page(page) }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), session.settled())
            .await
            .expect("settled() must complete after every request is processed");

        let page = session.rendered().unwrap().page;
        assert!((2..=9).contains(&page), "unexpected page {page}");
        assert!(session.fault().is_none());
    }
}

#[tokio::test]
async fn selecting_a_new_file_resets_the_session() {
    let file = stub_pdf();
    let session = session(StubBackend::with_pages(5));
    load(&session, &file).await;
    session.set_page(3);
    session.settled().await;

    let other = stub_pdf();
    session
        .select_file(&other.path().to_string_lossy())
        .await
        .unwrap();

    assert_eq!(session.phase(), SessionPhase::FileSelected);
    assert_eq!(session.current_page(), 1);
    assert!(session.page_count().is_none());
    assert!(session.rendered().is_none());
    assert!(session.fault().is_none());
}

#[tokio::test]
async fn parse_failure_records_fault_and_allows_retry() {
    let file = stub_pdf();
    let backend = StubBackend::failing_open(5);
    let session = PageSession::with_backend(SnapshotConfig::default(), backend.clone()).unwrap();

    session
        .select_file(&file.path().to_string_lossy())
        .await
        .unwrap();
    let err = session.convert().await.unwrap_err();
    assert!(matches!(err, SnapshotError::ParseFailed { .. }));
    assert!(matches!(session.fault(), Some(SessionFault::Parse(_))));
    assert_eq!(session.phase(), SessionPhase::FileSelected);

    // The source file survives; a retry against a recovered backend works.
    backend.fail_open.store(false, Ordering::SeqCst);
    let pages = session.convert().await.unwrap();
    assert_eq!(pages, 5);
    assert!(session.fault().is_none());
}

#[tokio::test]
async fn select_bytes_accepts_inline_pdfs() {
    let session = session(StubBackend::with_pages(2));
    session.select_bytes(b"%PDF-1.4\n", "inline.pdf").unwrap();

    assert_eq!(session.phase(), SessionPhase::FileSelected);
    assert_eq!(session.file_name(), Some("inline.pdf".to_string()));

    let err = session.select_bytes(b"not a pdf", "bad.bin").unwrap_err();
    assert!(matches!(err, SnapshotError::NotAPdf { .. }));
}

// ── Upload through a live relay ──────────────────────────────────────────

mod relay_stub {
    use pagesnap::relay::storage::{StorageClient, StoredMedia, UploadOptions};
    use pagesnap::StorageError;

    pub struct StubStorage {
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl StorageClient for StubStorage {
        async fn upload_image(
            &self,
            _data_uri: &str,
            _options: &UploadOptions,
        ) -> Result<StoredMedia, StorageError> {
            if self.fail {
                return Err(StorageError::Rejected {
                    status: 401,
                    body: "denied".into(),
                });
            }
            let media = StoredMedia::from_response(serde_json::json!({
                "url": "https://cdn.example.com/session.png",
                "public_id": "session",
            }))
            .unwrap();
            Ok(media)
        }
    }
}

/// Bind a relay on an ephemeral port and return its upload URL.
async fn spawn_relay(fail: bool) -> String {
    let app = pagesnap::relay::router(
        Arc::new(relay_stub::StubStorage { fail }),
        Default::default(),
        1024 * 1024,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}/api/upload")
}

#[tokio::test]
async fn upload_round_trips_through_the_relay() {
    let relay_url = spawn_relay(false).await;
    let config = SnapshotConfig::builder()
        .relay_url(relay_url)
        .build()
        .unwrap();
    let session = PageSession::with_backend(config, StubBackend::with_pages(3)).unwrap();

    let file = stub_pdf();
    session
        .select_file(&file.path().to_string_lossy())
        .await
        .unwrap();
    session.convert().await.unwrap();
    session.settled().await;

    let response = session.upload().await.unwrap();
    match response {
        UploadResponse::Accepted(receipt) => {
            assert_eq!(receipt.url, "https://cdn.example.com/session.png");
        }
        UploadResponse::Rejected { status, message } => {
            panic!("expected acceptance, got HTTP {status}: {message}");
        }
    }
    assert!(session.fault().is_none());
}

#[tokio::test]
async fn rejected_upload_is_typed_and_recorded_as_a_fault() {
    let relay_url = spawn_relay(true).await;
    let config = SnapshotConfig::builder()
        .relay_url(relay_url)
        .build()
        .unwrap();
    let session = PageSession::with_backend(config, StubBackend::with_pages(3)).unwrap();

    let file = stub_pdf();
    session
        .select_file(&file.path().to_string_lossy())
        .await
        .unwrap();
    session.convert().await.unwrap();
    session.settled().await;

    let response = session.upload().await.unwrap();
    match response {
        UploadResponse::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Something went wrong");
        }
        UploadResponse::Accepted(_) => panic!("expected rejection"),
    }
    assert!(matches!(session.fault(), Some(SessionFault::Upload(_))));
}
