//! Upload: send a captured page to the upload relay.
//!
//! The relay's wire contract is a single JSON POST:
//! `{"data": "<data URI>"}` in, the storage service's JSON back (or a generic
//! 500 body). The response is validated here into a tagged [`UploadResponse`]
//! so callers branch on a sum type instead of poking at untyped fields.
//! Non-success responses are surfaced, never retried.

use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::pipeline::capture::RenderedImage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// The storage service's record for one stored image, as relayed back to the
/// client.
///
/// Unknown fields are kept verbatim in `extra` so the relay's
/// "return the storage response unmodified" contract survives the typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Publicly retrievable URL of the stored image.
    pub url: String,
    /// Storage-service identifier for the image.
    #[serde(alias = "public_id")]
    pub id: String,
    /// Any further fields the storage service included.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of one upload attempt.
#[derive(Debug, Clone)]
pub enum UploadResponse {
    /// Relay answered 2xx with the storage service's record.
    Accepted(UploadReceipt),
    /// Relay answered with a non-success status; `message` is its JSON
    /// `message` field when present, otherwise the raw body.
    Rejected { status: u16, message: String },
}

impl UploadResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadResponse::Accepted(_))
    }
}

/// HTTP client for the upload relay endpoint.
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    /// Build a client for the relay endpoint named in `config`.
    pub fn new(config: &SnapshotConfig) -> Result<Self, SnapshotError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upload_timeout_secs))
            .build()
            .map_err(|e| SnapshotError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: config.relay_url.clone(),
        })
    }

    /// POST a captured page to the relay and validate the answer.
    ///
    /// # Errors
    /// [`SnapshotError::RelayUnreachable`] when the request itself fails
    /// (network error, timeout). A reachable relay that answers non-2xx is
    /// NOT an error here — it comes back as [`UploadResponse::Rejected`].
    pub async fn upload(&self, image: &RenderedImage) -> Result<UploadResponse, SnapshotError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "data": image.data_uri }))
            .send()
            .await
            .map_err(|e| SnapshotError::RelayUnreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        info!("Relay responded: HTTP {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| SnapshotError::RelayUnreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        if status.is_success() {
            let receipt: UploadReceipt = serde_json::from_str(&body).map_err(|e| {
                SnapshotError::Internal(format!("relay returned unparseable body: {}", e))
            })?;
            info!("Image stored at {}", receipt.url);
            Ok(UploadResponse::Accepted(receipt))
        } else {
            let message = serde_json::from_str::<RelayFailureBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            warn!("Upload rejected (HTTP {}): {}", status, message);
            Ok(UploadResponse::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[derive(Deserialize)]
struct RelayFailureBody {
    message: String,
}
