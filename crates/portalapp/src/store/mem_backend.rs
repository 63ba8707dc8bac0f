use super::backend::{entry_size, KeyValueBackend, ObjectBackend, Usage};
use crate::error::{PortalError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock(map: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    // A panic while holding the lock cannot leave a half-written map behind.
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory large-quota backend for tests and ephemeral sessions.
///
/// `set_available(false)` makes every call fail with `Unavailable`, which is how a
/// disabled or private-mode object store behaves.
pub struct MemObjectBackend {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
    available: AtomicBool,
}

impl Default for MemObjectBackend {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: None,
            available: AtomicBool::new(true),
        }
    }
}

impl MemObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Test helper: the raw stored value, bypassing availability.
    pub fn raw(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    /// Test helper: store a raw value, bypassing availability and quota.
    pub fn insert_raw(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PortalError::Unavailable(
                "large-quota store is disabled".to_string(),
            ))
        }
    }
}

#[async_trait]
impl ObjectBackend for MemObjectBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(lock(&self.entries).get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        let mut entries = lock(&self.entries);
        if let Some(quota) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = entry_size(key, value);
            if others + needed > quota {
                return Err(PortalError::QuotaExceeded {
                    backend: "large-quota".to_string(),
                    needed,
                    available: quota.saturating_sub(others),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        lock(&self.entries).remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(lock(&self.entries).keys().cloned().collect())
    }

    async fn usage(&self) -> Result<Usage> {
        self.check()?;
        let used = lock(&self.entries)
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum();
        Ok(Usage {
            used_bytes: used,
            quota_bytes: self.quota_bytes,
        })
    }
}

/// In-memory small-quota backend with a hard byte quota.
pub struct MemKeyValueBackend {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: u64,
    simulate_write_error: AtomicBool,
}

pub const DEFAULT_SMALL_QUOTA: u64 = 5 * 1024 * 1024;

impl Default for MemKeyValueBackend {
    fn default() -> Self {
        Self::with_quota(DEFAULT_SMALL_QUOTA)
    }
}

impl MemKeyValueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes,
            simulate_write_error: AtomicBool::new(false),
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }
}

impl KeyValueBackend for MemKeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(PortalError::Unavailable("Simulated write error".to_string()));
        }
        let mut entries = lock(&self.entries);
        let others: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let needed = entry_size(key, value);
        if others + needed > self.quota_bytes {
            return Err(PortalError::QuotaExceeded {
                backend: "small-quota".to_string(),
                needed,
                available: self.quota_bytes.saturating_sub(others),
            });
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }

    fn usage(&self) -> Result<Usage> {
        let used = lock(&self.entries)
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum();
        Ok(Usage {
            used_bytes: used,
            quota_bytes: Some(self.quota_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn object_backend_crud() {
        let backend = MemObjectBackend::new();
        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.put("k", "v").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(backend.keys().await.unwrap(), vec!["k".to_string()]);
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn disabled_object_backend_fails_every_call() {
        let backend = MemObjectBackend::new();
        backend.put("k", "v").await.unwrap();
        backend.set_available(false);
        assert!(matches!(
            backend.get("k").await,
            Err(PortalError::Unavailable(_))
        ));
        assert!(backend.put("k", "w").await.is_err());
        backend.set_available(true);
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn object_backend_quota() {
        let backend = MemObjectBackend::new().with_quota(10);
        backend.put("a", "1234").await.unwrap();
        let err = backend.put("b", "123456789").await.unwrap_err();
        assert!(matches!(err, PortalError::QuotaExceeded { .. }));
        // Overwriting the same key does not count its old value twice
        backend.put("a", "12345678").await.unwrap();
    }

    #[test]
    fn key_value_quota_rejects_and_keeps_previous_value() {
        let backend = MemKeyValueBackend::with_quota(16);
        backend.set("key", "small").unwrap();
        let err = backend.set("key", "this value is far too large").unwrap_err();
        assert!(matches!(err, PortalError::QuotaExceeded { .. }));
        assert_eq!(backend.get("key").unwrap(), Some("small".to_string()));
        assert_eq!(backend.usage().unwrap().used_bytes, 8);
    }

    #[test]
    fn key_value_simulated_write_error() {
        let backend = MemKeyValueBackend::new();
        backend.set_simulate_write_error(true);
        assert!(backend.set("k", "v").is_err());
        assert_eq!(backend.get("k").unwrap(), None);
    }
}
