//! Configuration types for the page-conversion pipeline and the upload relay.
//!
//! The pipeline side is controlled through [`SnapshotConfig`], built via its
//! [`SnapshotConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks and to diff two runs.
//!
//! The relay side is controlled through [`RelayConfig`], constructed once at
//! process startup from an optional `pagesnap` config file plus
//! `PAGESNAP`-prefixed environment variables, and passed by reference into
//! the relay constructor. Storage credentials live in an explicit
//! [`StorageConfig`] field — there is no module-level global configuration.

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};

/// Configuration for one page-conversion session.
///
/// Built via [`SnapshotConfig::builder()`] or using
/// [`SnapshotConfig::default()`].
///
/// # Example
/// ```rust
/// use pagesnap::SnapshotConfig;
///
/// let config = SnapshotConfig::builder()
///     .scale(1.0)
///     .relay_url("http://localhost:8080/api/upload")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Render scale applied to the page's natural viewport. Default: 1.0.
    ///
    /// At 1.0 the raster surface is sized exactly to the page's natural
    /// dimensions (one pixel per PDF point). Clamped to 0.1–4.0 by the
    /// builder to keep pixel buffers bounded.
    pub scale: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Relay endpoint that `upload()` posts rendered images to.
    pub relay_url: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-upload HTTP timeout in seconds. Default: 60.
    pub upload_timeout_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            password: None,
            relay_url: "http://127.0.0.1:8080/api/upload".to_string(),
            download_timeout_secs: 120,
            upload_timeout_secs: 60,
        }
    }
}

impl SnapshotConfig {
    /// Create a new builder for `SnapshotConfig`.
    pub fn builder() -> SnapshotConfigBuilder {
        SnapshotConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SnapshotConfig`].
#[derive(Debug)]
pub struct SnapshotConfigBuilder {
    config: SnapshotConfig,
}

impl SnapshotConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(0.1, 4.0);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = url.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SnapshotConfig, SnapshotError> {
        let c = &self.config;
        if !(0.1..=4.0).contains(&c.scale) {
            return Err(SnapshotError::InvalidConfig(format!(
                "scale must be 0.1–4.0, got {}",
                c.scale
            )));
        }
        if c.relay_url.is_empty() {
            return Err(SnapshotError::InvalidConfig("relay_url must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Relay configuration ──────────────────────────────────────────────────

/// Default body size limit for the relay: 200 MB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// Fixed chunking threshold passed to the storage service: 6 MB.
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 6_000_000;

/// Configuration for the upload relay process.
///
/// Loaded once at startup via [`RelayConfig::load`]; every field can be set
/// from `pagesnap.toml` or from the environment, e.g.
/// `PAGESNAP__STORAGE__API_KEY=…`.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,

    pub storage: StorageConfig,
}

/// HTTP server binding.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted request body, enforced before the storage client runs.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Credentials and endpoint for the external media-storage service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the storage API, e.g. `https://api.example-media.com/v1`.
    pub endpoint: String,

    /// Account / cloud name, appended to the endpoint path.
    pub service_name: String,

    /// API key, sent as the basic-auth username.
    pub api_key: String,

    /// API secret, sent as the basic-auth password.
    pub api_secret: String,

    /// Chunking threshold forwarded to the storage service.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: u64,
}

impl RelayConfig {
    /// Load the relay configuration from `pagesnap.{toml,yaml,…}` (optional)
    /// and the `PAGESNAP`-prefixed environment, with `__` as the nesting
    /// separator.
    pub fn load() -> Result<Self, SnapshotError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name("pagesnap").required(false))
            .add_source(
                ::config::Environment::with_prefix("PAGESNAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SnapshotError::InvalidConfig(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SnapshotError::InvalidConfig(e.to_string()))
    }
}

// ── Default value functions ──────────────────────────────────────────────

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_body_bytes: default_max_body_bytes(),
    }
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_chunk_size_bytes() -> u64 {
    DEFAULT_CHUNK_SIZE_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_scale() {
        let config = SnapshotConfig::builder().scale(99.0).build().unwrap();
        assert_eq!(config.scale, 4.0);

        let config = SnapshotConfig::builder().scale(0.0).build().unwrap();
        assert_eq!(config.scale, 0.1);
    }

    #[test]
    fn builder_rejects_empty_relay_url() {
        let result = SnapshotConfig::builder().relay_url("").build();
        assert!(matches!(result, Err(SnapshotError::InvalidConfig(_))));
    }

    #[test]
    fn defaults_match_reference_contract() {
        let config = SnapshotConfig::default();
        assert_eq!(config.scale, 1.0);
        assert_eq!(config.download_timeout_secs, 120);

        assert_eq!(DEFAULT_MAX_BODY_BYTES, 209_715_200);
        assert_eq!(DEFAULT_CHUNK_SIZE_BYTES, 6_000_000);
    }

    #[test]
    fn storage_config_deserializes_with_default_chunk_size() {
        let config: StorageConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://api.example-media.com/v1",
                "service_name": "demo",
                "api_key": "key",
                "api_secret": "secret"
            }"#,
        )
        .unwrap();
        assert_eq!(config.chunk_size_bytes, 6_000_000);
    }
}
