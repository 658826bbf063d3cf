//! The upload relay: a stateless HTTP endpoint that forwards one image
//! payload per request to the external storage service.
//!
//! Contract (fixed by the client pipeline):
//! - `POST /api/upload` with `{"data": "<data URI>"}`, body capped at the
//!   configured limit (200 MB by default, enforced before the storage client
//!   runs).
//! - 200 with the storage service's JSON verbatim on success.
//! - 500 with `{"message": "Something went wrong"}` on any storage failure;
//!   the cause is logged here and never detailed to the caller.
//! - Malformed bodies are rejected at the JSON boundary (4xx), and non-POST
//!   methods on the route receive 405.
//!
//! The relay holds no state across requests beyond the shared storage client;
//! concurrent requests do not interact.

pub mod storage;

use crate::config::RelayConfig;
use crate::error::SnapshotError;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use storage::{HttpStorageClient, StorageClient, UploadOptions};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared relay state: the storage client and process start time.
pub struct RelayState {
    pub storage: Arc<dyn StorageClient>,
    pub upload_options: UploadOptions,
    pub start_time: Instant,
}

/// Upload request schema, validated at the boundary.
#[derive(Debug, Deserialize)]
pub struct UploadBody {
    /// Encoded image payload, normally a `data:image/png;base64,…` URI.
    pub data: String,
}

/// Build the relay router around a storage client.
///
/// `max_body_bytes` is enforced by [`DefaultBodyLimit`] on the upload route,
/// so oversized payloads are rejected before the storage client is invoked.
pub fn router(
    storage: Arc<dyn StorageClient>,
    upload_options: UploadOptions,
    max_body_bytes: usize,
) -> Router {
    let state = Arc::new(RelayState {
        storage,
        upload_options,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay from a loaded [`RelayConfig`] until the process exits.
pub async fn serve(config: RelayConfig) -> Result<(), SnapshotError> {
    let storage = HttpStorageClient::new(config.storage.clone())
        .map_err(|e| SnapshotError::InvalidConfig(e.to_string()))?;
    let options = UploadOptions {
        chunk_size_bytes: config.storage.chunk_size_bytes,
        ..UploadOptions::default()
    };

    let app = router(Arc::new(storage), options, config.limits.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SnapshotError::Internal(format!("bind {}: {}", addr, e)))?;
    info!("Upload relay listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| SnapshotError::Internal(format!("server error: {}", e)))
}

/// `POST /api/upload` — forward one image payload to the storage service.
async fn upload_handler(
    State(state): State<Arc<RelayState>>,
    Json(body): Json<UploadBody>,
) -> Response {
    match state
        .storage
        .upload_image(&body.data, &state.upload_options)
        .await
    {
        // The storage body goes back verbatim, whatever key spellings the
        // service chose.
        Ok(media) => (StatusCode::OK, Json(media.into_raw())).into_response(),
        Err(e) => {
            // The specific cause stays server-side; callers get a generic 500.
            error!("Storage upload failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Something went wrong" })),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

/// `GET /health` — liveness probe.
async fn health_handler(State(state): State<Arc<RelayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
