//! Test fixtures, available to unit tests and, through the `test_utils`
//! feature, to integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::api::PortalApi;
use crate::config::PortalConfig;
use crate::manifest::Manifest;
use crate::store::mem_backend::{MemKeyValueBackend, MemObjectBackend};

/// Two top-level chapters, one subchapter, one separator.
pub const SAMPLE_MANIFEST: &str = r#"[
    {"code": "01", "title": "Sistema", "items": [
        {"title": "Manual de Calidad", "path": "docs/01/manual.pdf", "tags": ["manual"]},
        {"title": "---", "separator": true}
    ], "subchapters": [
        {"code": "01.1", "title": "Procedimientos", "items": [
            {"title": "Control de Documentos", "path": "docs/01/1/control.pdf", "status": "Borrador"}
        ]}
    ]},
    {"code": "05", "title": "Ensayos"}
]"#;

/// In-memory backends that outlive any number of [`PortalApi`] sessions, so a
/// test can close the portal and open it again over the same storage.
pub struct PortalFixture {
    pub large: Arc<MemObjectBackend>,
    pub small: Arc<MemKeyValueBackend>,
    pub manifest: Manifest,
    pub config: PortalConfig,
    /// Scratch space for files to upload or export.
    pub dir: TempDir,
}

impl Default for PortalFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalFixture {
    pub fn new() -> Self {
        Self {
            large: Arc::new(MemObjectBackend::new()),
            small: Arc::new(MemKeyValueBackend::new()),
            manifest: Manifest::parse(SAMPLE_MANIFEST).expect("sample manifest parses"),
            config: PortalConfig {
                flush_retry_initial_ms: 10,
                flush_retry_max_secs: 2,
                blob_probe_max_secs: 5,
                ..Default::default()
            },
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn with_small_quota(mut self, quota_bytes: u64) -> Self {
        self.small = Arc::new(MemKeyValueBackend::with_quota(quota_bytes));
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut PortalConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn with_manifest(mut self, raw: &str) -> Self {
        self.manifest = Manifest::parse(raw).expect("fixture manifest parses");
        self
    }

    /// Writes `bytes` to `<dir>/<name>` and returns the path.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("failed to write fixture file");
        path
    }

    /// Opens a new session over the fixture's storage.
    pub async fn open(&self) -> PortalApi {
        PortalApi::open(
            self.manifest.clone(),
            self.large.clone(),
            self.small.clone(),
            self.config.clone(),
        )
        .await
    }
}
