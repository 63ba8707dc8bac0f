use super::backend::{BackendKind, KeyValueBackend, ObjectBackend, Usage};
use crate::error::{PortalError, Result};
use crate::model::{DocumentMeta, UploadedDocument};
use crate::snapshot::{self, Stamped};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const DEFAULT_WARN_RATIO: f64 = 0.8;

/// What [`CapacityStore::get`] found.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// A full snapshot, blobs included.
    Full {
        from: BackendKind,
        documents: Vec<UploadedDocument>,
    },
    /// Only the blob-free metadata cache answered.
    MetadataOnly(Vec<DocumentMeta>),
    Empty,
}

impl Loaded {
    pub fn len(&self) -> usize {
        match self {
            Loaded::Full { documents, .. } => documents.len(),
            Loaded::MetadataOnly(entries) => entries.len(),
            Loaded::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    /// The backend the headline figures come from.
    pub backend: BackendKind,
    pub used_bytes: u64,
    pub quota_bytes: Option<u64>,
    /// `None` when the large-quota backend could not be queried.
    pub large: Option<Usage>,
    pub small: Option<Usage>,
    pub warn_ratio: f64,
}

impl CapacityReport {
    pub fn ratio(&self) -> Option<f64> {
        Usage {
            used_bytes: self.used_bytes,
            quota_bytes: self.quota_bytes,
        }
        .ratio()
    }

    pub fn over_threshold(&self) -> bool {
        self.ratio().map(|r| r > self.warn_ratio).unwrap_or(false)
    }

    /// Whether the small-quota backend alone is past the threshold.
    pub fn small_over_threshold(&self) -> bool {
        self.small
            .and_then(|u| u.ratio())
            .map(|r| r > self.warn_ratio)
            .unwrap_or(false)
    }
}

pub type ThresholdHook = Arc<dyn Fn(&CapacityReport) + Send + Sync>;

/// Handle to the asynchronous half of [`CapacityStore::put`].
pub struct PendingWrite {
    handle: JoinHandle<Result<()>>,
}

impl PendingWrite {
    /// Waits for the large-quota write to settle.
    pub async fn settled(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| PortalError::Api(format!("large-quota write task failed: {}", e)))?
    }
}

/// The Capacity-Aware Store: one contract over both storage backends.
///
/// Blobs only ever go to the large-quota backend. The small-quota backend gets the
/// metadata projection, which keeps it far below its quota and gives recovery a
/// fallback when the large-quota backend is unavailable.
#[derive(Clone)]
pub struct CapacityStore {
    large: Arc<dyn ObjectBackend>,
    small: Arc<dyn KeyValueBackend>,
    warn_ratio: f64,
    on_threshold: Option<ThresholdHook>,
}

impl CapacityStore {
    pub fn new(large: Arc<dyn ObjectBackend>, small: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            large,
            small,
            warn_ratio: DEFAULT_WARN_RATIO,
            on_threshold: None,
        }
    }

    pub fn with_warn_ratio(mut self, ratio: f64) -> Self {
        self.warn_ratio = ratio;
        self
    }

    /// Called from [`capacity_report`](Self::capacity_report) whenever usage is past
    /// the warning ratio. Writes are never refused on this basis.
    pub fn with_threshold_hook(mut self, hook: ThresholdHook) -> Self {
        self.on_threshold = Some(hook);
        self
    }

    pub fn large(&self) -> &Arc<dyn ObjectBackend> {
        &self.large
    }

    pub fn small(&self) -> &Arc<dyn KeyValueBackend> {
        &self.small
    }

    /// Synchronous half of a put: the metadata projection into the small-quota backend.
    pub fn put_metadata(&self, key: &str, documents: &[UploadedDocument]) -> Result<()> {
        let raw = snapshot::encode_meta(documents)?;
        self.small.set(&snapshot::meta_key(key), &raw)
    }

    /// Asynchronous half of a put: the full snapshot into the large-quota backend.
    pub async fn put_full(&self, key: &str, documents: &[UploadedDocument]) -> Result<()> {
        self.put_full_as_of(key, documents, Utc::now()).await
    }

    /// [`put_full`](Self::put_full) for a copy of the registry taken at `as_of`.
    /// Recovery compares this stamp with the metadata's to spot a stale full snapshot.
    pub async fn put_full_as_of(
        &self,
        key: &str,
        documents: &[UploadedDocument],
        as_of: DateTime<Utc>,
    ) -> Result<()> {
        let raw = snapshot::encode_full_as_of(documents, as_of)?;
        self.large.put(key, &raw).await
    }

    /// Writes metadata now and hands the full-snapshot write to a background task.
    ///
    /// A metadata failure is returned immediately; the large-quota outcome is only
    /// observable through the returned [`PendingWrite`].
    ///
    /// One-shot writers such as recovery use this. The registry calls the two halves
    /// separately: [`put_metadata`](Self::put_metadata) under its lock and
    /// [`put_full_as_of`](Self::put_full_as_of) from its flush worker, so that full
    /// snapshots for one key never overlap.
    pub fn put(&self, key: &str, documents: &[UploadedDocument]) -> Result<PendingWrite> {
        let full = snapshot::encode_full(documents)?;
        let meta_result = self.put_metadata(key, documents);

        let large = Arc::clone(&self.large);
        let key_owned = key.to_string();
        let handle = tokio::spawn(async move { large.put(&key_owned, &full).await });
        let pending = PendingWrite { handle };

        match meta_result {
            Ok(()) => Ok(pending),
            Err(e) => {
                tracing::warn!(key, error = %e, "metadata write to small-quota backend failed");
                Err(e)
            }
        }
    }

    /// Large-quota backend first, then a legacy full snapshot in the small-quota
    /// backend, then the metadata cache. Errors and corrupt data count as misses.
    pub async fn get(&self, key: &str) -> Loaded {
        match self.probe_large(key).await {
            Ok(Some(stored)) => {
                return Loaded::Full {
                    from: BackendKind::Large,
                    documents: stored.items,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(key, error = %e, "large-quota read missed"),
        }
        match self.probe_small_full(key) {
            Ok(Some(stored)) => {
                return Loaded::Full {
                    from: BackendKind::Small,
                    documents: stored.items,
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(key, error = %e, "small-quota full read missed"),
        }
        match self.probe_small_meta(key) {
            Ok(Some(stored)) => Loaded::MetadataOnly(stored.items),
            Ok(None) => Loaded::Empty,
            Err(e) => {
                tracing::debug!(key, error = %e, "metadata read missed");
                Loaded::Empty
            }
        }
    }

    pub async fn probe_large(&self, key: &str) -> Result<Option<Stamped<UploadedDocument>>> {
        match self.large.get(key).await? {
            Some(raw) => snapshot::decode_full_stamped(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Reads a full snapshot from the small-quota backend: the legacy canonical
    /// key or a numbered backup.
    pub fn probe_small_full(&self, key: &str) -> Result<Option<Stamped<UploadedDocument>>> {
        match self.small.get(key)? {
            Some(raw) => snapshot::decode_full_stamped(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn probe_small_meta(&self, key: &str) -> Result<Option<Stamped<DocumentMeta>>> {
        let meta_key = snapshot::meta_key(key);
        match self.small.get(&meta_key)? {
            Some(raw) => snapshot::decode_meta_stamped(&meta_key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Legacy backup keys of `key` in the small-quota backend, newest first.
    pub fn backup_keys(&self, key: &str) -> Result<Vec<String>> {
        let keys = self.small.keys()?;
        Ok(snapshot::backup_keys(key, &keys))
    }

    /// Removes `key` and its metadata projection from both backends.
    /// Succeeds if at least one backend succeeded.
    ///
    /// The registry never removes its own key: clearing it writes an empty
    /// snapshot, which recovery reads as "cleared" rather than "never written".
    pub async fn remove(&self, key: &str) -> Result<()> {
        let large = self.large.delete(key).await;
        let small = self
            .small
            .remove(key)
            .and_then(|_| self.small.remove(&snapshot::meta_key(key)));
        either_succeeded("remove", large, small)
    }

    /// Empties both backends. Succeeds if at least one backend succeeded.
    pub async fn clear(&self) -> Result<()> {
        let large = self.clear_large().await;
        let small = self.clear_small();
        either_succeeded("clear", large, small)
    }

    async fn clear_large(&self) -> Result<()> {
        for key in self.large.keys().await? {
            self.large.delete(&key).await?;
        }
        Ok(())
    }

    fn clear_small(&self) -> Result<()> {
        for key in self.small.keys()? {
            self.small.remove(&key)?;
        }
        Ok(())
    }

    /// Usage of both backends. Headline figures come from the large-quota backend
    /// when it answers, otherwise from the small-quota one.
    pub async fn capacity_report(&self) -> CapacityReport {
        let large = match self.large.usage().await {
            Ok(u) => Some(u),
            Err(e) => {
                tracing::debug!(error = %e, "large-quota usage unavailable");
                None
            }
        };
        let small = match self.small.usage() {
            Ok(u) => Some(u),
            Err(e) => {
                tracing::debug!(error = %e, "small-quota usage unavailable");
                None
            }
        };
        let (backend, dominant) = match (large, small) {
            (Some(l), _) => (BackendKind::Large, l),
            (None, Some(s)) => (BackendKind::Small, s),
            (None, None) => (BackendKind::Large, Usage::default()),
        };
        let report = CapacityReport {
            backend,
            used_bytes: dominant.used_bytes,
            quota_bytes: dominant.quota_bytes,
            large,
            small,
            warn_ratio: self.warn_ratio,
        };
        if report.over_threshold() || report.small_over_threshold() {
            tracing::warn!(
                backend = %report.backend,
                used = report.used_bytes,
                quota = ?report.quota_bytes,
                "storage usage past warning threshold"
            );
            if let Some(hook) = &self.on_threshold {
                hook(&report);
            }
        }
        report
    }
}

fn either_succeeded(op: &str, large: Result<()>, small: Result<()>) -> Result<()> {
    match (large, small) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(e)) => {
            tracing::warn!(op, error = %e, "small-quota backend failed");
            Ok(())
        }
        (Err(e), Ok(())) => {
            tracing::warn!(op, error = %e, "large-quota backend failed");
            Ok(())
        }
        (Err(large), Err(small)) => {
            tracing::warn!(op, large = %large, "both backends failed");
            Err(small)
        }
    }
}
