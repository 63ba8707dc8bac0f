//! # Data Directory and Startup
//!
//! The command-line client keeps both storage facilities under one data
//! directory (layout in [`crate::store`]). The directory is resolved in order:
//!
//! 1. An explicit override (the client's `--data` flag).
//! 2. The `PORTAL_DATA` environment variable.
//! 3. The OS-appropriate data directory, via the `directories` crate.
//!
//! [`initialize`] then loads `portal.toml` from that directory, loads the
//! manifest, builds the on-disk backends and opens the [`PortalApi`], which runs
//! startup recovery.
//!
//! A relative manifest path is resolved against the data directory when it
//! exists there, otherwise against the working directory.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::PortalApi;
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::manifest;
use crate::store::fs_backend::{FsKeyValueBackend, FsObjectBackend};

pub const DATA_ENV: &str = "PORTAL_DATA";
pub const OBJECTS_DIR: &str = "objects";
pub const KV_DIR: &str = "kv";

pub struct PortalContext {
    pub api: PortalApi,
    pub data_dir: PathBuf,
}

pub fn resolve_data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_ENV) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "portal", "portal")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| PortalError::Config("could not determine a data directory".into()))
}

fn resolve_manifest(location: &str, data_dir: &Path) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    let path = Path::new(location);
    if path.is_relative() {
        let in_data = data_dir.join(path);
        if in_data.exists() {
            return in_data.to_string_lossy().into_owned();
        }
    }
    location.to_string()
}

/// Opens the portal over the on-disk backends in `data_dir`.
pub async fn initialize_at(data_dir: &Path, manifest_override: Option<String>) -> Result<PortalContext> {
    std::fs::create_dir_all(data_dir)?;
    let mut config = PortalConfig::load(data_dir)?;
    if let Some(location) = manifest_override {
        config.manifest = location;
    }

    let location = resolve_manifest(&config.manifest, data_dir);
    let manifest = manifest::load(&location, config.read_timeout()).await?;

    let large = FsObjectBackend::new(data_dir.join(OBJECTS_DIR)).with_quota(config.large_quota_bytes);
    let small = FsKeyValueBackend::new(data_dir.join(KV_DIR), config.small_quota_bytes);
    tracing::debug!(data_dir = %data_dir.display(), manifest = %location, "opening portal");

    let api = PortalApi::open(manifest, Arc::new(large), Arc::new(small), config).await;
    Ok(PortalContext {
        api,
        data_dir: data_dir.to_path_buf(),
    })
}

/// Resolves the data directory, then [`initialize_at`].
pub async fn initialize(
    data_override: Option<PathBuf>,
    manifest_override: Option<String>,
) -> Result<PortalContext> {
    let data_dir = resolve_data_dir(data_override)?;
    initialize_at(&data_dir, manifest_override).await
}
