//! # Document Registry
//!
//! The authoritative in-memory set of uploads. Every mutation funnels through
//! [`DocumentRegistry::add`], [`update`](DocumentRegistry::update),
//! [`remove`](DocumentRegistry::remove) or [`clear`](DocumentRegistry::clear); no other
//! component writes upload data to storage.
//!
//! ## Write Path
//!
//! A mutation:
//!
//! 1. applies the change in memory,
//! 2. writes the metadata projection to the small-quota backend (synchronous),
//! 3. schedules a flush of the full snapshot to the large-quota backend and returns.
//!
//! Steps 1 and 2 happen under one lock, so they never interleave with another
//! mutation. A crash after step 2 can lose the blob of the latest upload but never
//! its metadata.
//!
//! ## Serialized Flush
//!
//! At most one flush worker runs at a time. A mutation that arrives while the
//! worker is busy only sets a `queued` flag; the worker picks it up when the
//! current write settles. Each attempt snapshots the registry *when it starts*,
//! so a queued flush always writes the newest state and an older write can never
//! land after a newer one.
//!
//! Failed writes are retried with exponential backoff while the error is
//! transient (backend unavailable, I/O). Quota errors are permanent. When a flush
//! finally gives up, a notice is raised; the in-memory state stays as it is.
//!
//! Documents without a blob (restored from metadata only) never erase blobs that
//! the stored snapshot already holds: the stored blobs are merged in by id
//! before writing.
//!
//! [`DocumentRegistry::settle`] waits until the worker is idle.

use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

use crate::codec::EncodedBlob;
use crate::error::{PortalError, Result};
use crate::model::{DocumentPatch, IdGenerator, NewUpload, UploadedDocument};
use crate::notice::{Notice, NoticeSink, DEFAULT_TTL};
use crate::store::CapacityStore;

pub const DEFAULT_SNAPSHOT_KEY: &str = "uploadedDocuments";

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Canonical full-snapshot key.
    pub key: String,
    pub retry_initial: Duration,
    pub retry_max_interval: Duration,
    /// Give up a flush after retrying this long.
    pub retry_max_elapsed: Duration,
    pub notice_ttl: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_SNAPSHOT_KEY.to_string(),
            retry_initial: Duration::from_millis(200),
            retry_max_interval: Duration::from_secs(5),
            retry_max_elapsed: Duration::from_secs(30),
            notice_ttl: DEFAULT_TTL,
        }
    }
}

/// Observable state of the flush worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStatus {
    pub running: bool,
    pub queued: bool,
    pub completed: u64,
    pub failed: u64,
    pub last_error: Option<String>,
}

struct State {
    documents: Vec<UploadedDocument>,
    flush: FlushStatus,
}

struct Shared {
    store: CapacityStore,
    options: RegistryOptions,
    notices: Arc<dyn NoticeSink>,
    ids: IdGenerator,
    state: Mutex<State>,
    running: watch::Sender<bool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn notify_failure(&self, action: &str, err: &PortalError) {
        self.notices
            .notify(Notice::failure(action, err, self.options.notice_ttl));
    }
}

/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct DocumentRegistry {
    shared: Arc<Shared>,
}

impl DocumentRegistry {
    pub fn new(
        store: CapacityStore,
        options: RegistryOptions,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                store,
                options,
                notices,
                ids: IdGenerator::new(),
                state: Mutex::new(State {
                    documents: Vec::new(),
                    flush: FlushStatus::default(),
                }),
                running,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.shared.options.key
    }

    pub fn store(&self) -> &CapacityStore {
        &self.shared.store
    }

    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.shared.notices
    }

    pub(crate) fn notify_warning(&self, action: &str, message: String) {
        self.shared
            .notices
            .notify(Notice::warning(action, message, self.shared.options.notice_ttl));
    }

    /// Replaces the in-memory set without writing anything. Used by recovery.
    pub fn restore(&self, documents: Vec<UploadedDocument>) {
        self.shared.lock().documents = documents;
    }

    /// Registers a new upload under a freshly generated id.
    pub async fn add(&self, upload: NewUpload) -> Result<UploadedDocument> {
        let doc = UploadedDocument {
            id: self.shared.ids.next_id(),
            title: upload.title,
            chapter_code: upload.chapter_code,
            tags: upload.tags,
            file_name: upload.file_name,
            file_size_bytes: upload.file_size_bytes,
            mime_type: upload.mime_type,
            upload_timestamp: Utc::now(),
            status: upload.status,
            encoded_blob: Some(upload.encoded_blob),
        };
        {
            let mut state = self.shared.lock();
            state.documents.push(doc.clone());
            self.persist_metadata(&state.documents, "save document");
        }
        tracing::info!(id = %doc.id, chapter = %doc.chapter_code, "document added");
        self.schedule_flush();
        Ok(doc)
    }

    /// Edits title and/or tags. `NotFound` if `id` is unknown.
    pub async fn update(&self, id: &str, patch: DocumentPatch) -> Result<UploadedDocument> {
        let updated = {
            let mut state = self.shared.lock();
            let doc = state
                .documents
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| PortalError::NotFound(id.to_string()))?;
            if let Some(title) = patch.title {
                doc.title = title;
            }
            if let Some(tags) = patch.tags {
                doc.tags = tags;
            }
            let updated = doc.clone();
            self.persist_metadata(&state.documents, "update document");
            updated
        };
        tracing::info!(id, "document updated");
        self.schedule_flush();
        Ok(updated)
    }

    /// Deletes unconditionally. Confirmation is the caller's business.
    pub async fn remove(&self, id: &str) -> Result<UploadedDocument> {
        let removed = {
            let mut state = self.shared.lock();
            let pos = state
                .documents
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| PortalError::NotFound(id.to_string()))?;
            let removed = state.documents.remove(pos);
            self.persist_metadata(&state.documents, "delete document");
            removed
        };
        tracing::info!(id, "document removed");
        self.schedule_flush();
        Ok(removed)
    }

    /// Removes every upload. Returns how many there were.
    pub async fn clear(&self) -> usize {
        let count = {
            let mut state = self.shared.lock();
            let count = state.documents.len();
            state.documents.clear();
            self.persist_metadata(&state.documents, "clear documents");
            count
        };
        tracing::info!(count, "registry cleared");
        self.schedule_flush();
        count
    }

    /// Replaces the whole registry and persists it, ids preserved. Used by import.
    pub async fn replace_all(&self, documents: Vec<UploadedDocument>) -> usize {
        let count = documents.len();
        {
            let mut state = self.shared.lock();
            state.documents = documents;
            self.persist_metadata(&state.documents, "import documents");
        }
        self.schedule_flush();
        count
    }

    pub fn all(&self) -> Vec<UploadedDocument> {
        self.shared.lock().documents.clone()
    }

    /// Runs `f` over the documents without cloning them.
    pub fn with_documents<R>(&self, f: impl FnOnce(&[UploadedDocument]) -> R) -> R {
        f(&self.shared.lock().documents)
    }

    pub fn by_chapter(&self, code: &str) -> Vec<UploadedDocument> {
        self.shared
            .lock()
            .documents
            .iter()
            .filter(|d| d.chapter_code == code)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<UploadedDocument> {
        self.shared
            .lock()
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of documents whose blob is not in memory.
    pub fn missing_blobs(&self) -> Vec<String> {
        self.shared
            .lock()
            .documents
            .iter()
            .filter(|d| !d.has_blob())
            .map(|d| d.id.clone())
            .collect()
    }

    /// Fills in blobs for blob-less documents. Documents that already have one are
    /// left alone. Nothing is written: the blobs came from storage.
    pub fn patch_blobs(&self, blobs: &HashMap<String, EncodedBlob>) -> usize {
        let mut state = self.shared.lock();
        let mut patched = 0;
        for doc in state.documents.iter_mut().filter(|d| !d.has_blob()) {
            if let Some(blob) = blobs.get(&doc.id) {
                doc.encoded_blob = Some(blob.clone());
                patched += 1;
            }
        }
        if patched > 0 {
            tracing::info!(patched, "blobs patched into registry");
        }
        patched
    }

    pub fn flush_status(&self) -> FlushStatus {
        self.shared.lock().flush.clone()
    }

    /// Waits until no flush is running or queued.
    pub async fn settle(&self) {
        let mut rx = self.shared.running.subscribe();
        // The sender lives in `shared`, which we hold, so the channel cannot close.
        let _ = rx.wait_for(|running| !*running).await;
    }

    fn persist_metadata(&self, documents: &[UploadedDocument], action: &str) {
        if let Err(e) = self
            .shared
            .store
            .put_metadata(&self.shared.options.key, documents)
        {
            tracing::warn!(error = %e, action, "metadata write failed");
            self.shared.notify_failure(action, &e);
        }
    }

    fn schedule_flush(&self) {
        {
            let mut state = self.shared.lock();
            if state.flush.running {
                state.flush.queued = true;
                tracing::debug!("flush already running, queued");
                return;
            }
            state.flush.running = true;
            self.shared.running.send_replace(true);
        }
        let shared = Arc::clone(&self.shared);
        tokio::spawn(flush_worker(shared));
    }
}

async fn flush_worker(shared: Arc<Shared>) {
    loop {
        let outcome = flush_with_retry(&shared).await;

        let mut state = shared.lock();
        match outcome {
            Ok(count) => {
                state.flush.completed += 1;
                state.flush.last_error = None;
                tracing::debug!(documents = count, "full snapshot flushed");
            }
            Err(e) => {
                state.flush.failed += 1;
                state.flush.last_error = Some(e.to_string());
                tracing::warn!(error = %e, "giving up on full snapshot flush");
                shared.notify_failure("save document", &e);
            }
        }
        if state.flush.queued {
            state.flush.queued = false;
            continue;
        }
        state.flush.running = false;
        // Published under the lock so a concurrent schedule_flush cannot be
        // overwritten by this stale `false`.
        shared.running.send_replace(false);
        break;
    }
}

async fn flush_with_retry(shared: &Shared) -> Result<usize> {
    let policy = ExponentialBackoff {
        initial_interval: shared.options.retry_initial,
        max_interval: shared.options.retry_max_interval,
        max_elapsed_time: Some(shared.options.retry_max_elapsed),
        ..Default::default()
    };
    retry_notify(
        policy,
        || async move { flush_once(shared).await },
        |err: PortalError, after: Duration| {
            tracing::warn!(
                error = %err,
                retry_after_ms = after.as_millis() as u64,
                "flush failed, retry scheduled"
            );
        },
    )
    .await
}

fn classify(err: PortalError) -> backoff::Error<PortalError> {
    if err.is_transient() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

async fn flush_once(shared: &Shared) -> std::result::Result<usize, backoff::Error<PortalError>> {
    let key = shared.options.key.as_str();
    let (mut documents, taken_at) = {
        let state = shared.lock();
        (state.documents.clone(), Utc::now())
    };

    if documents.iter().any(|d| !d.has_blob()) {
        match shared.store.probe_large(key).await {
            Ok(Some(stored)) => {
                let blobs = stored_blobs(stored.items);
                let merged = merge_blobs(&mut documents, &blobs);
                if merged > 0 {
                    tracing::debug!(merged, "kept stored blobs for blob-less documents");
                }
            }
            Ok(None) => {}
            Err(e) if e.is_transient() => return Err(backoff::Error::transient(e)),
            Err(e) => tracing::warn!(error = %e, "stored snapshot unreadable, overwriting"),
        }
    }

    shared
        .store
        .put_full_as_of(key, &documents, taken_at)
        .await
        .map_err(classify)?;
    Ok(documents.len())
}

/// Blobs of a stored snapshot, by document id.
pub(crate) fn stored_blobs(stored: Vec<UploadedDocument>) -> HashMap<String, EncodedBlob> {
    stored
        .into_iter()
        .filter_map(|d| d.encoded_blob.map(|b| (d.id, b)))
        .collect()
}

fn merge_blobs(documents: &mut [UploadedDocument], blobs: &HashMap<String, EncodedBlob>) -> usize {
    let mut merged = 0;
    for doc in documents.iter_mut().filter(|d| !d.has_blob()) {
        if let Some(blob) = blobs.get(&doc.id) {
            doc.encoded_blob = Some(blob.clone());
            merged += 1;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::model::{DocumentMeta, Status};
    use crate::notice::NoticeLog;
    use crate::snapshot;
    use crate::store::backend::{ObjectBackend, Usage};
    use crate::store::mem_backend::{MemKeyValueBackend, MemObjectBackend};
    use crate::store::KeyValueBackend;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_options() -> RegistryOptions {
        RegistryOptions {
            retry_initial: Duration::from_millis(5),
            retry_max_interval: Duration::from_millis(20),
            retry_max_elapsed: Duration::from_millis(200),
            ..Default::default()
        }
    }

    struct Fixture {
        large: Arc<MemObjectBackend>,
        small: Arc<MemKeyValueBackend>,
        notices: Arc<NoticeLog>,
        registry: DocumentRegistry,
    }

    fn fixture() -> Fixture {
        let large = Arc::new(MemObjectBackend::new());
        let small = Arc::new(MemKeyValueBackend::new());
        let notices = Arc::new(NoticeLog::new());
        let registry = DocumentRegistry::new(
            CapacityStore::new(large.clone(), small.clone()),
            fast_options(),
            notices.clone(),
        );
        Fixture {
            large,
            small,
            notices,
            registry,
        }
    }

    fn upload(title: &str, chapter: &str) -> NewUpload {
        let bytes = vec![b'x'; 2048];
        NewUpload {
            title: title.into(),
            chapter_code: chapter.into(),
            tags: vec!["informe".into()],
            file_name: "report.txt".into(),
            file_size_bytes: bytes.len() as u64,
            mime_type: "text/plain".into(),
            status: Status::Approved,
            encoded_blob: codec::encode(&bytes, "text/plain"),
        }
    }

    fn stored(large: &MemObjectBackend) -> Vec<UploadedDocument> {
        snapshot::decode_full(DEFAULT_SNAPSHOT_KEY, &large.raw(DEFAULT_SNAPSHOT_KEY).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn add_persists_metadata_immediately_and_full_after_settle() {
        let f = fixture();
        let doc = f.registry.add(upload("Test Report", "05")).await.unwrap();
        assert!(doc.id.starts_with("upload_"));

        // Metadata is written before add returns
        let meta = f.small.get("uploadedDocuments.meta").unwrap().unwrap();
        assert!(meta.contains("Test Report"));

        f.registry.settle().await;
        let docs = stored(&f.large);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0], doc);
        assert_eq!(f.registry.flush_status().completed, 1);
    }

    #[tokio::test]
    async fn ids_are_pairwise_distinct() {
        let f = fixture();
        let mut ids = HashSet::new();
        for i in 0..50 {
            let doc = f.registry.add(upload(&format!("D{}", i), "01")).await.unwrap();
            ids.insert(doc.id);
        }
        assert_eq!(ids.len(), 50);
        f.registry.settle().await;
        assert_eq!(stored(&f.large).len(), 50);
    }

    #[tokio::test]
    async fn update_and_remove_unknown_id_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.registry.update("nope", DocumentPatch::title("x")).await,
            Err(PortalError::NotFound(_))
        ));
        assert!(matches!(
            f.registry.remove("nope").await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_changes_title_and_tags_only() {
        let f = fixture();
        let doc = f.registry.add(upload("Old", "02")).await.unwrap();
        let updated = f
            .registry
            .update(
                &doc.id,
                DocumentPatch::title("New").with_tags(vec!["a".into(), "b".into()]),
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.tags, vec!["a", "b"]);
        assert_eq!(updated.chapter_code, "02");
        assert_eq!(updated.encoded_blob, doc.encoded_blob);
    }

    #[tokio::test]
    async fn two_rapid_updates_persist_the_second() {
        let f = fixture();
        let doc = f.registry.add(upload("Original", "03")).await.unwrap();
        f.registry.settle().await;

        f.registry
            .update(&doc.id, DocumentPatch::title("First edit"))
            .await
            .unwrap();
        f.registry
            .update(&doc.id, DocumentPatch::title("Second edit"))
            .await
            .unwrap();
        f.registry.settle().await;

        assert_eq!(stored(&f.large)[0].title, "Second edit");
    }

    /// Large-quota backend whose writes take a while and which records how many
    /// overlap.
    struct SlowBackend {
        inner: MemObjectBackend,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl ObjectBackend for SlowBackend {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, value: &str) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let result = self.inner.put(key, value).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.puts.fetch_add(1, Ordering::SeqCst);
            result
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
        async fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys().await
        }
        async fn usage(&self) -> Result<Usage> {
            self.inner.usage().await
        }
    }

    #[tokio::test]
    async fn flushes_never_overlap_and_last_state_wins() {
        let slow = Arc::new(SlowBackend {
            inner: MemObjectBackend::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        });
        let registry = DocumentRegistry::new(
            CapacityStore::new(slow.clone(), Arc::new(MemKeyValueBackend::new())),
            fast_options(),
            Arc::new(NoticeLog::new()),
        );

        let doc = registry.add(upload("v0", "01")).await.unwrap();
        for i in 1..=10 {
            registry
                .update(&doc.id, DocumentPatch::title(format!("v{}", i)))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(3)).await;
        }
        registry.settle().await;

        assert_eq!(slow.max_in_flight.load(Ordering::SeqCst), 1);
        // Queued mutations coalesce instead of each firing a write
        assert!(slow.puts.load(Ordering::SeqCst) < 11);
        let raw = slow.inner.raw(DEFAULT_SNAPSHOT_KEY).unwrap();
        let docs = snapshot::decode_full(DEFAULT_SNAPSHOT_KEY, &raw).unwrap();
        assert_eq!(docs[0].title, "v10");
    }

    #[tokio::test]
    async fn failing_large_backend_keeps_metadata_and_raises_notice() {
        let f = fixture();
        f.large.set_available(false);
        f.registry.add(upload("Offline", "05")).await.unwrap();
        f.registry.settle().await;

        let status = f.registry.flush_status();
        assert_eq!(status.failed, 1);
        assert!(status.last_error.is_some());
        assert!(f.small.get("uploadedDocuments.meta").unwrap().is_some());

        let notices = f.notices.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].action, "save document");
        assert!(!notices[0].message.contains("large-quota"));
    }

    #[tokio::test]
    async fn quota_errors_are_not_retried() {
        let large = Arc::new(MemObjectBackend::new().with_quota(100));
        let notices = Arc::new(NoticeLog::new());
        let mut options = fast_options();
        options.retry_max_elapsed = Duration::from_secs(60);
        let registry = DocumentRegistry::new(
            CapacityStore::new(large, Arc::new(MemKeyValueBackend::new())),
            options,
            notices.clone(),
        );
        registry.add(upload("Too big", "01")).await.unwrap();
        // Would take a minute if the quota error were treated as transient
        tokio::time::timeout(Duration::from_secs(5), registry.settle())
            .await
            .unwrap();
        assert_eq!(registry.flush_status().failed, 1);
        assert!(notices.drain()[0].message.contains("storage is full"));
    }

    #[tokio::test]
    async fn metadata_quota_failure_is_a_notice_not_an_error() {
        let large = Arc::new(MemObjectBackend::new());
        let notices = Arc::new(NoticeLog::new());
        let registry = DocumentRegistry::new(
            CapacityStore::new(large.clone(), Arc::new(MemKeyValueBackend::with_quota(10))),
            fast_options(),
            notices.clone(),
        );
        let doc = registry.add(upload("Still saved", "01")).await.unwrap();
        registry.settle().await;

        assert_eq!(registry.len(), 1);
        assert_eq!(stored(&large)[0].id, doc.id);
        assert!(notices
            .drain()
            .iter()
            .any(|n| n.message == "Could not save document: storage is full"));
    }

    #[tokio::test]
    async fn blobless_documents_do_not_erase_stored_blobs() {
        let f = fixture();
        let doc = f.registry.add(upload("Keeps blob", "04")).await.unwrap();
        f.registry.settle().await;

        // A later session that only knows the metadata
        let meta: DocumentMeta = doc.meta();
        let later = DocumentRegistry::new(
            CapacityStore::new(f.large.clone(), f.small.clone()),
            fast_options(),
            f.notices.clone(),
        );
        later.restore(vec![UploadedDocument::from_meta(&meta)]);
        later
            .update(&doc.id, DocumentPatch::title("Renamed"))
            .await
            .unwrap();
        later.settle().await;

        let docs = stored(&f.large);
        assert_eq!(docs[0].title, "Renamed");
        assert_eq!(docs[0].encoded_blob, doc.encoded_blob);
        // The in-memory copy stays blob-less until recovery patches it
        assert_eq!(later.missing_blobs(), vec![doc.id]);
    }

    #[tokio::test]
    async fn by_chapter_keeps_insertion_order() {
        let f = fixture();
        let a = f.registry.add(upload("A", "05")).await.unwrap();
        f.registry.add(upload("B", "01")).await.unwrap();
        let c = f.registry.add(upload("C", "05")).await.unwrap();
        let ids: Vec<String> = f
            .registry
            .by_chapter("05")
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn clear_and_remove_persist() {
        let f = fixture();
        let a = f.registry.add(upload("A", "05")).await.unwrap();
        f.registry.add(upload("B", "05")).await.unwrap();
        f.registry.remove(&a.id).await.unwrap();
        f.registry.settle().await;
        assert_eq!(stored(&f.large).len(), 1);

        assert_eq!(f.registry.clear().await, 1);
        f.registry.settle().await;
        assert!(stored(&f.large).is_empty());
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn patch_blobs_only_fills_missing() {
        let f = fixture();
        let doc = f.registry.add(upload("A", "01")).await.unwrap();
        f.registry.settle().await;
        f.registry.restore(vec![
            UploadedDocument::from_meta(&doc.meta()),
            doc.clone(),
        ]);
        let mut blobs = HashMap::new();
        blobs.insert(doc.id.clone(), EncodedBlob::from_raw("data:text/plain;base64,eA=="));
        assert_eq!(f.registry.patch_blobs(&blobs), 1);
        assert!(f.registry.missing_blobs().is_empty());
    }
}
