//! # Configuration
//!
//! Portal configuration is a [`confique`] struct loaded in layers:
//!
//! 1. **Environment variables**: `PORTAL_MANIFEST`, `PORTAL_SMALL_QUOTA_BYTES`, etc.
//! 2. **Data-directory file**: `<data dir>/portal.toml`.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `manifest` | `data/manifest.json` | Manifest path or `http(s)://` URL |
//! | `snapshot_key` | `uploadedDocuments` | Canonical full-snapshot key |
//! | `max_upload_bytes` | 50 MB | Largest accepted upload |
//! | `read_timeout_secs` | `30` | Budget for reading an upload from disk |
//! | `small_quota_bytes` | 5 MB | Capacity of the small-quota backend |
//! | `large_quota_bytes` | unbounded | Capacity of the large-quota backend |
//! | `capacity_warn_ratio` | `0.8` | Usage ratio that triggers a capacity warning |
//! | `flush_retry_initial_ms` | `200` | First retry delay of a failed flush |
//! | `flush_retry_max_secs` | `30` | Stop retrying a flush after this long |
//! | `blob_probe_max_secs` | `60` | Stop re-probing for missing blobs after this long |
//! | `notice_ttl_secs` | `5` | Lifetime of a notice |
//! | `favorites_enabled` | `false` | Enables favorites |
//! | `allowed_extensions` | built-in list | Upload extension allow-list |

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PortalError, Result};
use crate::recovery::RecoveryOptions;
use crate::registry::RegistryOptions;

pub const CONFIG_FILE: &str = "portal.toml";

/// Extensions accepted for upload when `allowed_extensions` is not set.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // documents
    "pdf", "doc", "docx", "odt", "rtf",
    // spreadsheets
    "xls", "xlsx", "ods", "csv",
    // presentations
    "ppt", "pptx", "odp",
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "svg", "webp", "tif", "tiff",
    // text and config
    "txt", "md", "json", "xml", "yaml", "yml", "toml", "ini", "log", "html", "htm",
    // code
    "js", "ts", "py", "java", "c", "cpp", "h", "cs", "rs", "go", "sql", "sh", "css",
    // archives
    "zip", "rar", "7z", "tar", "gz",
    // CAD and design
    "dwg", "dxf", "step", "stp", "iges", "igs", "psd", "ai",
];

/// Configuration for the portal, stored in `portal.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PortalConfig {
    /// Manifest location: a file path or an http(s) URL.
    #[config(env = "PORTAL_MANIFEST", default = "data/manifest.json")]
    pub manifest: String,

    /// Key of the full snapshot. The metadata cache lives under `<key>.meta`.
    #[config(env = "PORTAL_SNAPSHOT_KEY", default = "uploadedDocuments")]
    pub snapshot_key: String,

    #[config(env = "PORTAL_MAX_UPLOAD_BYTES", default = 52428800)]
    pub max_upload_bytes: u64,

    #[config(env = "PORTAL_READ_TIMEOUT_SECS", default = 30)]
    pub read_timeout_secs: u64,

    #[config(env = "PORTAL_SMALL_QUOTA_BYTES", default = 5242880)]
    pub small_quota_bytes: u64,

    /// Unbounded when absent.
    #[config(env = "PORTAL_LARGE_QUOTA_BYTES")]
    pub large_quota_bytes: Option<u64>,

    #[config(env = "PORTAL_CAPACITY_WARN_RATIO", default = 0.8)]
    pub capacity_warn_ratio: f64,

    #[config(env = "PORTAL_FLUSH_RETRY_INITIAL_MS", default = 200)]
    pub flush_retry_initial_ms: u64,

    #[config(env = "PORTAL_FLUSH_RETRY_MAX_SECS", default = 30)]
    pub flush_retry_max_secs: u64,

    #[config(env = "PORTAL_BLOB_PROBE_MAX_SECS", default = 60)]
    pub blob_probe_max_secs: u64,

    #[config(env = "PORTAL_NOTICE_TTL_SECS", default = 5)]
    pub notice_ttl_secs: u64,

    #[config(env = "PORTAL_FAVORITES_ENABLED", default = false)]
    pub favorites_enabled: bool,

    /// Upload extension allow-list, without dots. When absent, [`DEFAULT_EXTENSIONS`].
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            manifest: "data/manifest.json".to_string(),
            snapshot_key: "uploadedDocuments".to_string(),
            max_upload_bytes: 52428800,
            read_timeout_secs: 30,
            small_quota_bytes: 5242880,
            large_quota_bytes: None,
            capacity_warn_ratio: 0.8,
            flush_retry_initial_ms: 200,
            flush_retry_max_secs: 30,
            blob_probe_max_secs: 60,
            notice_ttl_secs: 5,
            favorites_enabled: false,
            allowed_extensions: None,
        }
    }
}

impl PortalConfig {
    /// Loads env > `<data_dir>/portal.toml` > defaults. A missing file is fine.
    pub fn load(data_dir: &Path) -> Result<Self> {
        PortalConfig::builder()
            .env()
            .file(data_dir.join(CONFIG_FILE))
            .load()
            .map_err(|e| PortalError::Config(e.to_string()))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_secs)
    }

    /// Allowed extensions, lowercased and without leading dots.
    pub fn allowed_extensions(&self) -> Vec<String> {
        match &self.allowed_extensions {
            Some(list) => list
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn is_extension_allowed(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions().iter().any(|e| *e == ext)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            key: self.snapshot_key.clone(),
            retry_initial: Duration::from_millis(self.flush_retry_initial_ms),
            retry_max_elapsed: Duration::from_secs(self.flush_retry_max_secs),
            notice_ttl: self.notice_ttl(),
            ..RegistryOptions::default()
        }
    }

    pub fn recovery_options(&self) -> RecoveryOptions {
        RecoveryOptions {
            probe_max_elapsed: Duration::from_secs(self.blob_probe_max_secs),
            ..RecoveryOptions::default()
        }
    }
}
