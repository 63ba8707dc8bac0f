//! Favorite catalog entries.
//!
//! Favorites are catalog entry ids (`upload_...` or `manifest_...`) kept as a
//! JSON array in the small-quota backend under `<key>.favorites`. The feature is
//! off unless `favorites_enabled` is set; while off, every call fails with
//! [`PortalError::FeatureDisabled`] and nothing is read or written.

use std::sync::Arc;

use crate::error::{PortalError, Result};
use crate::snapshot::favorites_key;
use crate::store::KeyValueBackend;

const FEATURE: &str = "favorites";

#[derive(Clone)]
pub struct Favorites {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
    enabled: bool,
}

impl Favorites {
    pub fn new(backend: Arc<dyn KeyValueBackend>, snapshot_key: &str, enabled: bool) -> Self {
        Self {
            backend,
            key: favorites_key(snapshot_key),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.enabled {
            Ok(())
        } else {
            Err(PortalError::FeatureDisabled(FEATURE))
        }
    }

    fn read(&self) -> Result<Vec<String>> {
        match self.backend.get(&self.key)? {
            None => Ok(Vec::new()),
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| PortalError::CorruptSnapshot {
                    key: self.key.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn write(&self, ids: &[String]) -> Result<()> {
        let raw = serde_json::to_string(ids)?;
        self.backend.set(&self.key, &raw)
    }

    /// Favorite ids in the order they were added.
    pub fn list(&self) -> Result<Vec<String>> {
        self.ensure_enabled()?;
        self.read()
    }

    pub fn is_favorite(&self, id: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|f| f == id))
    }

    /// Adds `id` if absent, removes it otherwise. Returns whether it is now a favorite.
    pub fn toggle(&self, id: &str) -> Result<bool> {
        self.ensure_enabled()?;
        let mut ids = self.read()?;
        let now_favorite = match ids.iter().position(|f| f == id) {
            Some(idx) => {
                ids.remove(idx);
                false
            }
            None => {
                ids.push(id.to_string());
                true
            }
        };
        self.write(&ids)?;
        tracing::debug!(id, favorite = now_favorite, "favorite toggled");
        Ok(now_favorite)
    }

    /// Drops favorites whose entry no longer exists. Returns how many were dropped.
    pub fn prune(&self, exists: impl Fn(&str) -> bool) -> Result<usize> {
        self.ensure_enabled()?;
        let ids = self.read()?;
        let before = ids.len();
        let kept: Vec<String> = ids.into_iter().filter(|id| exists(id)).collect();
        let dropped = before - kept.len();
        if dropped > 0 {
            self.write(&kept)?;
        }
        Ok(dropped)
    }
}
