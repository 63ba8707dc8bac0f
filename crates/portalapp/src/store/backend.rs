use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Which of the two storage facilities an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Asynchronous, high-capacity object store. Holds full snapshots with blobs.
    Large,
    /// Synchronous, low-capacity string store. Holds metadata and legacy data.
    Small,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Large => f.write_str("large-quota"),
            BackendKind::Small => f.write_str("small-quota"),
        }
    }
}

/// Byte usage of one backend. `quota_bytes` is `None` when the backend is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Usage {
    pub used_bytes: u64,
    pub quota_bytes: Option<u64>,
}

impl Usage {
    pub fn ratio(&self) -> Option<f64> {
        match self.quota_bytes {
            Some(0) => Some(1.0),
            Some(q) => Some(self.used_bytes as f64 / q as f64),
            None => None,
        }
    }
}

/// Large-quota storage: an asynchronous key/value object store.
///
/// Every call may suspend. Implementations report a disabled or refused store
/// as `PortalError::Unavailable` and a rejected write as `PortalError::QuotaExceeded`.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Read the value stored under `key`. `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys currently stored.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Current usage estimate.
    async fn usage(&self) -> Result<Usage>;
}

/// Small-quota storage: a synchronous key/string store with a hard byte quota.
///
/// Calls never suspend, so a sequence of them cannot interleave with other
/// in-process work.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`. Fails with `QuotaExceeded` when the write
    /// would push usage past the quota; the previous value is left intact.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    fn usage(&self) -> Result<Usage>;
}

/// Bytes a key/value pair occupies, counted the way browsers count string storage.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
