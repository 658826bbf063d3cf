//! Storage service client: forward an encoded image to the external
//! media-storage API.
//!
//! The relay treats storage as an opaque collaborator behind a narrow
//! contract: one upload call with fixed options, one typed record back. The
//! [`StorageClient`] trait is the seam — relay tests substitute a stub, and
//! the production [`HttpStorageClient`] speaks the service's HTTP API with
//! credentials from an explicit [`StorageConfig`].

use crate::config::StorageConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

/// Options forwarded with every upload.
///
/// The reference contract is fixed: image-type storage with a 6 MB chunking
/// threshold.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub resource_type: &'static str,
    pub chunk_size_bytes: u64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            resource_type: "image",
            chunk_size_bytes: crate::config::DEFAULT_CHUNK_SIZE_BYTES,
        }
    }
}

/// The storage service's record for one stored image.
///
/// `url` and `id` are the typed views the relay relies on; the service's
/// original JSON body is kept untouched in `raw`, and that is what the relay
/// serialises back to the caller. Key spellings the service chose (such as
/// `public_id`) therefore survive the pass-through byte-for-byte.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    url: String,
    id: String,
    raw: serde_json::Value,
}

#[derive(Deserialize)]
struct MediaFields {
    url: String,
    #[serde(alias = "public_id")]
    id: String,
}

impl StoredMedia {
    /// Validate a storage response body, keeping it verbatim alongside the
    /// typed fields.
    pub fn from_response(raw: serde_json::Value) -> Result<Self, StorageError> {
        let fields: MediaFields = serde_json::from_value(raw.clone())
            .map_err(|source| StorageError::InvalidResponse { source })?;
        Ok(Self {
            url: fields.url,
            id: fields.id,
            raw,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The service's response body, exactly as received.
    pub fn into_raw(self) -> serde_json::Value {
        self.raw
    }
}

/// One image payload in, one stored-media record out.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload_image(
        &self,
        data_uri: &str,
        options: &UploadOptions,
    ) -> Result<StoredMedia, StorageError>;
}

/// Production storage client speaking the service's HTTP upload API.
pub struct HttpStorageClient {
    http: reqwest::Client,
    config: StorageConfig,
}

impl HttpStorageClient {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Transport {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.endpoint.trim_end_matches('/'),
            self.config.service_name
        )
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn upload_image(
        &self,
        data_uri: &str,
        options: &UploadOptions,
    ) -> Result<StoredMedia, StorageError> {
        let url = self.upload_url();
        debug!(
            "Forwarding {} bytes to storage service ({})",
            data_uri.len(),
            options.resource_type
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&json!({
                "file": data_uri,
                "resource_type": options.resource_type,
                "chunk_size": options.chunk_size_bytes,
            }))
            .send()
            .await
            .map_err(|e| StorageError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| StorageError::Transport {
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|source| StorageError::InvalidResponse { source })?;
        let media = StoredMedia::from_response(raw)?;
        info!("Storage service stored image: {}", media.url());
        Ok(media)
    }
}
