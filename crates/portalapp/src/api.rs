//! # API Facade
//!
//! [`PortalApi`] is the application context: it is built once at startup, owns
//! every long-lived piece of state, and is the single entry point for clients.
//!
//! ## Role and Responsibilities
//!
//! The facade:
//! - **Wires** the manifest, the capacity-aware store, the registry, the notice
//!   sinks and the favorites together
//! - **Recovers** the registry from storage before anything else can run
//! - **Dispatches** each user action to its `commands::*` function
//!
//! It holds no business logic and does no terminal I/O.
//!
//! ## Lifecycle
//!
//! ```text
//! open()      recovery runs, a blob patcher may start in the background
//! ...         commands; each mutation flushes in the background
//! shutdown()  waits for the last flush, stops the patcher
//! ```
//!
//! Dropping the API without [`PortalApi::shutdown`] may lose a pending
//! large-quota write; the metadata cache is always current.

use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;

use crate::catalog::EntryFilter;
use crate::commands::{self, CmdResult};
use crate::config::PortalConfig;
use crate::error::Result;
use crate::favorites::Favorites;
use crate::manifest::Manifest;
use crate::notice::{FanoutSink, Notice, NoticeLog, NoticeSink, TracingSink};
use crate::recovery::{self, BlobPatcher, RecoveryReport};
use crate::registry::DocumentRegistry;
use crate::store::{CapacityReport, CapacityStore, KeyValueBackend, ObjectBackend};

pub struct PortalApi {
    manifest: Manifest,
    registry: DocumentRegistry,
    config: PortalConfig,
    favorites: Favorites,
    notices: Arc<NoticeLog>,
    recovery: RecoveryReport,
    patcher: Option<BlobPatcher>,
}

impl PortalApi {
    /// Builds the context over the given backends and runs startup recovery.
    pub async fn open(
        manifest: Manifest,
        large: Arc<dyn ObjectBackend>,
        small: Arc<dyn KeyValueBackend>,
        config: PortalConfig,
    ) -> Self {
        let notices = Arc::new(NoticeLog::new());
        let sink: Arc<dyn NoticeSink> = Arc::new(
            FanoutSink::new()
                .with(notices.clone())
                .with(Arc::new(TracingSink)),
        );

        let hook_sink = sink.clone();
        let ttl = config.notice_ttl();
        let store = CapacityStore::new(large, small.clone())
            .with_warn_ratio(config.capacity_warn_ratio)
            .with_threshold_hook(Arc::new(move |report: &CapacityReport| {
                let pct = report.ratio().map(|r| (r * 100.0).round() as u64).unwrap_or(100);
                hook_sink.notify(Notice::warning(
                    "check storage",
                    format!("Storage is {}% full. Consider removing old uploads.", pct),
                    ttl,
                ));
            }));

        let registry = DocumentRegistry::new(store, config.registry_options(), sink);
        let favorites = Favorites::new(small, &config.snapshot_key, config.favorites_enabled);
        let recovered = recovery::recover(&registry, config.recovery_options()).await;

        Self {
            manifest,
            registry,
            config,
            favorites,
            notices,
            recovery: recovered.report,
            patcher: recovered.patcher,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Whether the background blob patcher is still running.
    pub fn blobs_pending(&self) -> bool {
        self.patcher.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Waits for the blob patcher to stop. Returns how many blobs it patched.
    pub async fn wait_for_blobs(&mut self) -> usize {
        match self.patcher.take() {
            Some(patcher) => patcher.finished().await,
            None => 0,
        }
    }

    /// Waits for pending writes and stops background work.
    pub async fn shutdown(mut self) {
        self.registry.settle().await;
        if let Some(patcher) = self.patcher.take() {
            patcher.abort();
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn upload(&self, request: commands::upload::UploadRequest) -> Result<CmdResult> {
        commands::upload::run(&self.registry, &self.manifest, &self.config, request).await
    }

    pub async fn update_document(
        &self,
        id: &str,
        update: commands::update::DocumentUpdate,
    ) -> Result<CmdResult> {
        commands::update::run(&self.registry, id, update).await
    }

    pub async fn delete_documents(&self, ids: &[String]) -> Result<CmdResult> {
        commands::delete::run(&self.registry, ids).await
    }

    pub async fn clear_documents(&self) -> Result<CmdResult> {
        commands::clear::run(&self.registry).await
    }

    pub fn chapters(&self) -> Result<CmdResult> {
        commands::list::chapters(&self.manifest, &self.registry)
    }

    pub fn list_chapter(&self, code: &str, filter: &EntryFilter) -> Result<CmdResult> {
        commands::list::run(&self.manifest, &self.registry, code, filter, Self::today())
    }

    pub fn recent(&self, limit: usize) -> Result<CmdResult> {
        commands::recent::run(&self.manifest, &self.registry, limit)
    }

    pub fn search(&self, query: &str) -> Result<CmdResult> {
        commands::search::run(&self.manifest, &self.registry, query)
    }

    pub fn stats(&self) -> Result<CmdResult> {
        commands::stats::run(&self.manifest, &self.registry, Self::today())
    }

    pub fn view(&self, id: &str, dest: &Path) -> Result<CmdResult> {
        commands::view::run(&self.manifest, &self.registry, id, dest)
    }

    pub async fn capacity(&self) -> Result<CmdResult> {
        commands::capacity::run(self.registry.store()).await
    }

    pub async fn doctor(&self) -> Result<CmdResult> {
        commands::doctor::run(self.registry.store(), self.registry.key()).await
    }

    pub fn export(&self, dest: &Path) -> Result<CmdResult> {
        commands::export::run(&self.registry, dest)
    }

    pub async fn import(&self, archive: &Path) -> Result<CmdResult> {
        commands::import::run(&self.registry, archive).await
    }

    pub fn toggle_favorite(&self, id: &str) -> Result<CmdResult> {
        commands::favorites::toggle(&self.favorites, &self.manifest, &self.registry, id)
    }

    pub fn favorites(&self) -> Result<CmdResult> {
        commands::favorites::list(&self.favorites, &self.manifest, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::upload::UploadRequest;
    use crate::recovery::RecoverySource;
    use crate::fixtures::PortalFixture;

    #[tokio::test]
    async fn open_on_empty_storage() {
        let fixture = PortalFixture::new();
        let api = fixture.open().await;
        assert_eq!(api.recovery_report().source, RecoverySource::Empty);
        assert!(!api.blobs_pending());
        assert!(api.registry().is_empty());
        api.shutdown().await;
    }

    #[tokio::test]
    async fn upload_survives_reopen() {
        let fixture = PortalFixture::new();
        let file = fixture.write_file("report.pdf", b"%PDF-1.7");
        let api = fixture.open().await;
        api.upload(UploadRequest::new(&file, "Test Report", "05"))
            .await
            .unwrap();
        api.shutdown().await;

        let reopened = fixture.open().await;
        assert_eq!(reopened.recovery_report().source, RecoverySource::LargeFull);
        let listed = reopened.list_chapter("05", &EntryFilter::default()).unwrap();
        assert_eq!(listed.listed.len(), 1);
        assert_eq!(listed.listed[0].title, "Test Report");
        assert!(listed.listed[0].has_blob);
        reopened.shutdown().await;
    }

    #[tokio::test]
    async fn capacity_hook_raises_notice() {
        let fixture = PortalFixture::new().with_small_quota(200);
        let api = fixture.open().await;
        fixture
            .small
            .set("filler", &"x".repeat(180))
            .unwrap();
        let result = api.capacity().await.unwrap();
        assert!(result.capacity.is_some());
        assert!(api
            .notices()
            .active()
            .iter()
            .any(|n| n.action == "check storage"));
        api.shutdown().await;
    }

    #[tokio::test]
    async fn favorites_follow_config_flag() {
        let fixture = PortalFixture::new();
        let api = fixture.open().await;
        assert!(api.favorites().is_err());
        api.shutdown().await;

        let fixture = fixture.with_config(|c| c.favorites_enabled = true);
        let api = fixture.open().await;
        api.toggle_favorite("manifest_01/Manual de Calidad").unwrap();
        assert_eq!(api.favorites().unwrap().listed.len(), 1);
        api.shutdown().await;
    }
}
