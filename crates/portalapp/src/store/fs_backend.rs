use super::backend::{entry_size, KeyValueBackend, ObjectBackend, Usage};
use crate::error::{PortalError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const OBJECT_EXT: &str = ".json";
const KV_FILE: &str = "kv.json";

/// Keys become file names: ASCII alphanumerics plus `.`, `_` and `-` pass through,
/// every other byte is written as `%XX`.
fn key_to_file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + OBJECT_EXT.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-') || (b == b'.' && !name.is_empty())
        {
            name.push(b as char);
        } else {
            name.push_str(&format!("%{:02X}", b));
        }
    }
    name.push_str(OBJECT_EXT);
    name
}

fn file_name_to_key(name: &str) -> Option<String> {
    let stem = name.strip_suffix(OBJECT_EXT)?;
    let mut bytes = Vec::with_capacity(stem.len());
    let mut iter = stem.bytes();
    while let Some(b) = iter.next() {
        if b == b'%' {
            let hi = iter.next()?;
            let lo = iter.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }
    String::from_utf8(bytes).ok()
}

/// Large-quota backend on disk: one file per key under `root`.
///
/// Writes go through a temporary file and a rename so a crash never leaves a
/// half-written snapshot behind.
pub struct FsObjectBackend {
    root: PathBuf,
    quota_bytes: Option<u64>,
}

impl FsObjectBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota_bytes: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key_to_file_name(key))
    }

    async fn entries(&self) -> Result<Vec<(String, u64)>> {
        let mut out = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(PortalError::Io(e)),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = file_name_to_key(name) {
                let len = entry.metadata().await?.len();
                out.push((key, len));
            }
        }
        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl ObjectBackend for FsObjectBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortalError::Io(e)),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        if let Some(quota) = self.quota_bytes {
            let others: u64 = self
                .entries()
                .await?
                .iter()
                .filter(|(k, _)| k != key)
                .map(|(k, len)| k.len() as u64 + len)
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

        let tmp_path = self.root.join(format!(".obj-{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp_path, value).await?;
        tokio::fs::rename(&tmp_path, self.path_for(key)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortalError::Io(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries().await?.into_iter().map(|(k, _)| k).collect())
    }

    async fn usage(&self) -> Result<Usage> {
        let used = self
            .entries()
            .await?
            .iter()
            .map(|(k, len)| k.len() as u64 + len)
            .sum();
        Ok(Usage {
            used_bytes: used,
            quota_bytes: self.quota_bytes,
        })
    }
}

/// Small-quota backend on disk: a single `kv.json` map under `root`, capped at
/// `quota_bytes`.
pub struct FsKeyValueBackend {
    root: PathBuf,
    quota_bytes: u64,
    // Serializes read-modify-write cycles on kv.json
    write_lock: Mutex<()>,
}

impl FsKeyValueBackend {
    pub fn new(root: impl Into<PathBuf>, quota_bytes: u64) -> Self {
        Self {
            root: root.into(),
            quota_bytes,
            write_lock: Mutex::new(()),
        }
    }

    fn file(&self) -> PathBuf {
        self.root.join(KV_FILE)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let path = self.file();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| PortalError::CorruptSnapshot {
            key: KV_FILE.to_string(),
            reason: e.to_string(),
        })
    }

    fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        let content = serde_json::to_string(map)?;
        let tmp_file = self.root.join(format!(".kv-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, self.file())?;
        Ok(())
    }

    fn used(map: &BTreeMap<String, String>) -> u64 {
        map.iter().map(|(k, v)| entry_size(k, v)).sum()
    }
}

impl KeyValueBackend for FsKeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.load()?;
        let others = Self::used(&map) - map.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        let needed = entry_size(key, value);
        if others + needed > self.quota_bytes {
            return Err(PortalError::QuotaExceeded {
                backend: "small-quota".to_string(),
                needed,
                available: self.quota_bytes.saturating_sub(others),
            });
        }
        map.insert(key.to_string(), value.to_string());
        self.save(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    fn usage(&self) -> Result<Usage> {
        Ok(Usage {
            used_bytes: Self::used(&self.load()?),
            quota_bytes: Some(self.quota_bytes),
        })
    }
}
