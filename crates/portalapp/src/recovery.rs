//! # Startup Recovery
//!
//! Runs once before the catalog is first shown. Every known storage location is
//! probed in a fixed trust order, and the first one that answers with parseable
//! data wins:
//!
//! 1. Full snapshot in the large-quota backend.
//! 2. Full snapshot in the small-quota backend (legacy builds wrote it there).
//!    Adopted, then copied to the large-quota backend.
//! 3. Metadata snapshot in the small-quota backend. The registry starts without
//!    blobs and a background [`BlobPatcher`] keeps probing the large-quota backend,
//!    patching blobs in by document id as they become readable. It retries only
//!    while that backend fails to answer. Once it answers, blobs it does not hold
//!    are lost: the patcher stops and raises a notice.
//! 4. Legacy backup keys `<key>_backup_<digits>`, newest first.
//! 5. Nothing: empty registry.
//!
//! A read error or corrupt JSON is a miss, never a failure: the procedure falls
//! through to the next step and records why in [`RecoveryReport::skipped`].
//!
//! ## Partial State
//!
//! Metadata is written synchronously on every mutation while the full snapshot is
//! written later. When the full snapshot wins but the metadata lists ids it does not
//! contain, those uploads had their large-quota write fail. They are kept as
//! blob-less documents, reported in [`RecoveryReport::partial`], and handed to the
//! blob patcher like step 3 documents.
//!
//! Both snapshots carry `savedAt`. When the metadata was written after the full
//! snapshot, a later `remove` or `update` never reached the large-quota backend.
//! The metadata then decides which documents exist and what their titles and tags
//! are: ids it no longer lists are dropped ([`RecoveryReport::dropped`]) and edits
//! it carries are applied ([`RecoveryReport::amended`]). Recovery writes the result
//! back so both backends agree again.

use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::error::PortalError;
use crate::model::{DocumentMeta, UploadedDocument};
use crate::registry::{stored_blobs, DocumentRegistry};
use crate::store::CapacityStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoverySource {
    LargeFull,
    SmallFull,
    MetadataOnly,
    Backup { key: String },
    Empty,
}

impl RecoverySource {
    pub fn describe(&self) -> String {
        match self {
            RecoverySource::LargeFull => "full snapshot (large-quota storage)".to_string(),
            RecoverySource::SmallFull => "legacy full snapshot (small-quota storage)".to_string(),
            RecoverySource::MetadataOnly => "metadata only (small-quota storage)".to_string(),
            RecoverySource::Backup { key } => format!("legacy backup '{}'", key),
            RecoverySource::Empty => "nothing stored".to_string(),
        }
    }
}

/// A location that was probed and passed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLocation {
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub source: RecoverySource,
    pub documents: usize,
    /// Documents restored without their blob.
    pub missing_blobs: usize,
    /// Metadata ids absent from the winning full snapshot.
    pub partial: Vec<String>,
    /// Full-snapshot ids deleted by a newer metadata snapshot.
    pub dropped: Vec<String>,
    /// Documents whose title or tags came from a newer metadata snapshot.
    pub amended: Vec<String>,
    pub skipped: Vec<SkippedLocation>,
    /// Whether recovery rewrote storage to match what it restored: a legacy
    /// small-quota snapshot copied over, or a stale full snapshot replaced.
    pub self_healed: bool,
}

/// Result of probing without touching the registry.
#[derive(Debug, Clone)]
pub struct Probe {
    pub source: RecoverySource,
    pub documents: Vec<UploadedDocument>,
    pub partial: Vec<String>,
    pub dropped: Vec<String>,
    pub amended: Vec<String>,
    pub skipped: Vec<SkippedLocation>,
}

impl Probe {
    fn new(source: RecoverySource, documents: Vec<UploadedDocument>, skipped: Vec<SkippedLocation>) -> Self {
        Self {
            source,
            documents,
            partial: Vec::new(),
            dropped: Vec::new(),
            amended: Vec::new(),
            skipped,
        }
    }

    pub fn missing_blobs(&self) -> usize {
        self.documents.iter().filter(|d| !d.has_blob()).count()
    }

    /// Whether the full snapshot was behind the metadata.
    pub fn is_stale(&self) -> bool {
        !self.dropped.is_empty() || !self.amended.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub probe_initial: Duration,
    pub probe_max_interval: Duration,
    /// Stop re-probing for blobs after this long.
    pub probe_max_elapsed: Duration,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            probe_initial: Duration::from_millis(500),
            probe_max_interval: Duration::from_secs(10),
            probe_max_elapsed: Duration::from_secs(60),
        }
    }
}

fn skip(skipped: &mut Vec<SkippedLocation>, location: impl Into<String>, err: &PortalError) {
    let location = location.into();
    tracing::warn!(location = %location, error = %err, "recovery step missed");
    skipped.push(SkippedLocation {
        location,
        reason: err.to_string(),
    });
}

/// Adds metadata entries the full snapshot lacks, as blob-less documents.
fn reconcile_partial(probe: &mut Probe, meta: Vec<DocumentMeta>) {
    let known: HashSet<&str> = probe.documents.iter().map(|d| d.id.as_str()).collect();
    let missing: Vec<DocumentMeta> = meta
        .into_iter()
        .filter(|m| !known.contains(m.id.as_str()))
        .collect();
    for entry in missing {
        tracing::warn!(id = %entry.id, "metadata entry without full snapshot counterpart");
        probe.partial.push(entry.id.clone());
        probe.documents.push(UploadedDocument::from_meta(&entry));
    }
}

/// Rebuilds the document list from a metadata snapshot written after the full one.
/// Blobs and file details still come from the full snapshot.
fn apply_newer_metadata(probe: &mut Probe, meta: Vec<DocumentMeta>) {
    let order: Vec<String> = probe.documents.iter().map(|d| d.id.clone()).collect();
    let mut stored: HashMap<String, UploadedDocument> = probe
        .documents
        .drain(..)
        .map(|d| (d.id.clone(), d))
        .collect();

    for entry in meta {
        match stored.remove(&entry.id) {
            Some(mut doc) => {
                if doc.title != entry.title || doc.tags != entry.tags {
                    tracing::warn!(id = %entry.id, "full snapshot has an outdated title or tags");
                    doc.title = entry.title;
                    doc.tags = entry.tags;
                    probe.amended.push(doc.id.clone());
                }
                probe.documents.push(doc);
            }
            None => {
                tracing::warn!(id = %entry.id, "metadata entry without full snapshot counterpart");
                probe.partial.push(entry.id.clone());
                probe.documents.push(UploadedDocument::from_meta(&entry));
            }
        }
    }

    for id in order {
        if stored.contains_key(&id) {
            tracing::warn!(id = %id, "full snapshot still lists a deleted upload");
            probe.dropped.push(id);
        }
    }
}

/// Probes every location in trust order. Reads only.
#[instrument(level = "debug", skip(store))]
pub async fn probe(store: &CapacityStore, key: &str) -> Probe {
    let mut skipped = Vec::new();

    let mut found: Option<(Probe, Option<DateTime<Utc>>)> = match store.probe_large(key).await {
        Ok(Some(stored)) => Some((
            Probe::new(RecoverySource::LargeFull, stored.items, Vec::new()),
            stored.saved_at,
        )),
        Ok(None) => None,
        Err(e) => {
            skip(&mut skipped, format!("large-quota '{}'", key), &e);
            None
        }
    };

    if found.is_none() {
        found = match store.probe_small_full(key) {
            Ok(Some(stored)) => Some((
                Probe::new(RecoverySource::SmallFull, stored.items, Vec::new()),
                stored.saved_at,
            )),
            Ok(None) => None,
            Err(e) => {
                skip(&mut skipped, format!("small-quota '{}'", key), &e);
                None
            }
        };
    }

    let meta = match store.probe_small_meta(key) {
        Ok(meta) => meta,
        Err(e) => {
            skip(&mut skipped, format!("small-quota '{}.meta'", key), &e);
            None
        }
    };

    if let Some((mut probe, saved_at)) = found {
        if let Some(meta) = meta {
            if meta.written_after(saved_at) {
                apply_newer_metadata(&mut probe, meta.items);
            } else {
                reconcile_partial(&mut probe, meta.items);
            }
        }
        probe.skipped = skipped;
        return probe;
    }

    if let Some(meta) = meta {
        let documents = meta.items.iter().map(UploadedDocument::from_meta).collect();
        return Probe::new(RecoverySource::MetadataOnly, documents, skipped);
    }

    match store.backup_keys(key) {
        Ok(backups) => {
            for backup in backups {
                match store.probe_small_full(&backup) {
                    Ok(Some(stored)) => {
                        return Probe::new(RecoverySource::Backup { key: backup }, stored.items, skipped)
                    }
                    Ok(None) => {}
                    Err(e) => skip(&mut skipped, format!("small-quota '{}'", backup), &e),
                }
            }
        }
        Err(e) => skip(&mut skipped, "small-quota key listing", &e),
    }

    Probe::new(RecoverySource::Empty, Vec::new(), skipped)
}

/// Background task that fills in blobs for documents restored without them.
pub struct BlobPatcher {
    handle: JoinHandle<usize>,
}

impl BlobPatcher {
    fn spawn(registry: DocumentRegistry, options: RecoveryOptions) -> Self {
        let handle = tokio::spawn(async move { patch_blobs(registry, options).await });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the patcher to stop. Returns how many blobs it patched.
    pub async fn finished(self) -> usize {
        self.handle.await.unwrap_or(0)
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn patch_blobs(registry: DocumentRegistry, options: RecoveryOptions) -> usize {
    let policy = ExponentialBackoff {
        initial_interval: options.probe_initial,
        max_interval: options.probe_max_interval,
        max_elapsed_time: Some(options.probe_max_elapsed),
        ..Default::default()
    };
    let patched = AtomicUsize::new(0);
    let registry = &registry;
    let counter = &patched;

    let outcome = retry_notify(
        policy,
        || async move {
            if registry.missing_blobs().is_empty() {
                return Ok(());
            }
            match registry.store().probe_large(registry.key()).await {
                Ok(Some(stored)) => {
                    counter.fetch_add(registry.patch_blobs(&stored_blobs(stored.items)), Ordering::SeqCst);
                }
                // The large-quota backend answered, so nothing is on its way.
                Ok(None) => {}
                Err(e @ PortalError::CorruptSnapshot { .. }) => {
                    return Err(backoff::Error::permanent(e));
                }
                Err(e) => return Err(backoff::Error::transient(e)),
            }
            let lost = registry.missing_blobs();
            if lost.is_empty() {
                Ok(())
            } else {
                Err(backoff::Error::permanent(PortalError::NotFound(format!(
                    "stored content for {}",
                    lost.join(", ")
                ))))
            }
        },
        |err: PortalError, after: Duration| {
            tracing::debug!(error = %err, retry_after_ms = after.as_millis() as u64, "blob re-probe scheduled");
        },
    )
    .await;

    let patched = patched.load(Ordering::SeqCst);
    match outcome {
        Ok(()) => tracing::info!(patched, "blob re-probe complete"),
        Err(e) => {
            tracing::warn!(patched, error = %e, "blob re-probe gave up");
            let lost = registry.missing_blobs().len();
            if lost > 0 {
                registry.notify_warning(
                    "restore document content",
                    format!("The content of {} upload(s) could not be recovered.", lost),
                );
            }
        }
    }
    patched
}

/// Writes the recovered set to both backends. Reports whether the full snapshot landed.
async fn rewrite(store: &CapacityStore, key: &str, documents: &[UploadedDocument], done: &str) -> bool {
    let pending = match store.put(key, documents) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!(error = %e, "could not write recovered metadata");
            return false;
        }
    };
    match pending.settled().await {
        Ok(()) => {
            tracing::info!(documents = documents.len(), "{}", done);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not write recovered snapshot to large-quota storage");
            false
        }
    }
}

/// Outcome of [`recover`].
pub struct Recovery {
    pub report: RecoveryReport,
    /// Running when documents were restored without blobs.
    pub patcher: Option<BlobPatcher>,
}

/// Probes storage, fills `registry`, self-heals a legacy snapshot, and starts the
/// blob patcher when needed.
#[instrument(level = "info", skip(registry, options), fields(key = %registry.key()))]
pub async fn recover(registry: &DocumentRegistry, options: RecoveryOptions) -> Recovery {
    let store = registry.store();
    let key = registry.key().to_string();
    let probe = probe(store, &key).await;

    let self_healed = if probe.source == RecoverySource::SmallFull {
        rewrite(store, &key, &probe.documents, "legacy snapshot copied to large-quota storage").await
    } else if probe.is_stale() {
        rewrite(store, &key, &probe.documents, "stale full snapshot replaced").await
    } else {
        false
    };

    let report = RecoveryReport {
        documents: probe.documents.len(),
        missing_blobs: probe.missing_blobs(),
        source: probe.source,
        partial: probe.partial,
        dropped: probe.dropped,
        amended: probe.amended,
        skipped: probe.skipped,
        self_healed,
    };
    registry.restore(probe.documents);

    tracing::info!(
        source = %report.source.describe(),
        documents = report.documents,
        missing_blobs = report.missing_blobs,
        "registry recovered"
    );

    let patcher = if report.missing_blobs > 0 {
        Some(BlobPatcher::spawn(registry.clone(), options))
    } else {
        None
    };

    Recovery { report, patcher }
}
