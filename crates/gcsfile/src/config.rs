//! Configuration module

use crate::{CloudError, Context, Result, StorageClient};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How handles respond to `Seek`.
///
/// Object streams are strictly sequential, so no policy ever repositions the
/// stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekPolicy {
    /// Report success at offset 0 without moving
    #[default]
    Ignore,
    /// Fail with `ErrorKind::Unsupported`
    Reject,
}

/// Per-handle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Size of each uploaded part in bytes (default: 8MB)
    pub write_buffer_size: usize,
    /// Whether to use multipart upload for large objects (default: true)
    pub use_multipart_upload: bool,
    /// Buffered bytes that trigger a multipart upload (default: 64MB)
    pub multipart_threshold: usize,
    /// Seek behaviour (default: ignore)
    pub seek: SeekPolicy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: 8 * 1024 * 1024,    // 8MB
            use_multipart_upload: true,
            multipart_threshold: 64 * 1024 * 1024, // 64MB
            seek: SeekPolicy::Ignore,
        }
    }
}

/// Settings for constructing a [`StorageClient`](crate::StorageClient).
///
/// With no credentials set, discovery falls back to the environment
/// (`GOOGLE_SERVICE_ACCOUNT`, `GOOGLE_APPLICATION_CREDENTIALS`, instance
/// metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Path to a service account JSON file
    pub service_account_path: Option<PathBuf>,
    /// Inline service account JSON
    pub service_account_key: Option<String>,
    /// Path to application default credentials
    pub application_credentials: Option<PathBuf>,
    /// Number of resolved bucket stores kept alive (default: 16)
    pub bucket_cache_size: usize,
    /// Worker threads of the client's runtime (default: 2)
    pub worker_threads: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            service_account_path: None,
            service_account_key: None,
            application_credentials: None,
            bucket_cache_size: 16,
            worker_threads: 2,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    /// Project the client is bound to
    pub project: Option<String>,
    pub client: ClientOptions,
    pub file: FileConfig,
}

impl GcsConfig {
    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CloudError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Connect a storage client for the configured project
    pub fn connect(&self, ctx: &Context) -> Result<StorageClient> {
        let project = self
            .project
            .as_deref()
            .ok_or_else(|| CloudError::Config("No project configured".to_string()))?;
        StorageClient::connect(ctx, project, self.client.clone())
    }

    /// Render configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CloudError::Config(format!("Failed to serialize config: {}", e)))
    }
}
