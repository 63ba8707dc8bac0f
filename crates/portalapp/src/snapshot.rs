//! Serialized forms of the upload registry.
//!
//! Two snapshot shapes are written, both versioned:
//!
//! ```text
//! <key>        {"version":1,"savedAt":"...","documents":[UploadedDocument, ...]}   large-quota
//! <key>.meta   {"version":1,"savedAt":"...","entries":[DocumentMeta, ...]}         small-quota
//! ```
//!
//! Readers also accept a bare JSON array (the versionless layout older builds
//! wrote) and the legacy backup keys `<key>_backup_<digits>`, which are only ever
//! read, never created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};
use crate::model::{DocumentMeta, UploadedDocument};

pub const SNAPSHOT_VERSION: u32 = 1;

const META_SUFFIX: &str = ".meta";
const FAVORITES_SUFFIX: &str = ".favorites";
const BACKUP_INFIX: &str = "_backup_";

pub fn meta_key(key: &str) -> String {
    format!("{}{}", key, META_SUFFIX)
}

pub fn favorites_key(key: &str) -> String {
    format!("{}{}", key, FAVORITES_SUFFIX)
}

/// The embedded sequence of a legacy backup key, or `None` if `candidate`
/// is not a backup of `key`.
pub fn backup_sequence(key: &str, candidate: &str) -> Option<u128> {
    let digits = candidate.strip_prefix(key)?.strip_prefix(BACKUP_INFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Backup keys of `key` among `keys`, most recent first.
pub fn backup_keys<'a>(key: &str, keys: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut found: Vec<(u128, &String)> = keys
        .into_iter()
        .filter_map(|k| backup_sequence(key, k).map(|seq| (seq, k)))
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, k)| k.clone()).collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct DocumentsBody<'a> {
    documents: &'a [UploadedDocument],
}

#[derive(Serialize)]
struct EntriesBody<'a> {
    entries: &'a [DocumentMeta],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FullRead {
    Versioned {
        version: u32,
        #[serde(default, rename = "savedAt")]
        saved_at: Option<DateTime<Utc>>,
        #[serde(default)]
        documents: Vec<UploadedDocument>,
    },
    Bare(Vec<UploadedDocument>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetaRead {
    Versioned {
        version: u32,
        #[serde(default, rename = "savedAt")]
        saved_at: Option<DateTime<Utc>>,
        #[serde(default)]
        entries: Vec<DocumentMeta>,
    },
    Bare(Vec<DocumentMeta>),
}

fn envelope<T>(body: T, saved_at: DateTime<Utc>) -> Envelope<T> {
    Envelope {
        version: SNAPSHOT_VERSION,
        saved_at,
        body,
    }
}

pub fn encode_full(documents: &[UploadedDocument]) -> Result<String> {
    encode_full_as_of(documents, Utc::now())
}

/// Full snapshot stamped with the moment `documents` was read from the registry.
pub fn encode_full_as_of(documents: &[UploadedDocument], saved_at: DateTime<Utc>) -> Result<String> {
    Ok(serde_json::to_string(&envelope(DocumentsBody { documents }, saved_at))?)
}

/// Metadata projection of `documents`. Blobs are never part of it.
pub fn encode_meta(documents: &[UploadedDocument]) -> Result<String> {
    let entries: Vec<DocumentMeta> = documents.iter().map(DocumentMeta::from).collect();
    Ok(serde_json::to_string(&envelope(EntriesBody { entries: &entries }, Utc::now()))?)
}

fn corrupt(key: &str, reason: impl Into<String>) -> PortalError {
    PortalError::CorruptSnapshot {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn check_version(key: &str, version: u32) -> Result<()> {
    if version > SNAPSHOT_VERSION {
        return Err(corrupt(
            key,
            format!("unsupported snapshot version {}", version),
        ));
    }
    Ok(())
}

/// A decoded snapshot and the time it was written. Bare arrays carry no time.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub saved_at: Option<DateTime<Utc>>,
    pub items: Vec<T>,
}

impl<T> Stamped<T> {
    fn unstamped(items: Vec<T>) -> Self {
        Self {
            saved_at: None,
            items,
        }
    }

    /// Whether this snapshot was written strictly after `other`.
    /// Unknown times never count as newer.
    pub fn written_after(&self, other: Option<DateTime<Utc>>) -> bool {
        match (self.saved_at, other) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

pub fn decode_full_stamped(key: &str, raw: &str) -> Result<Stamped<UploadedDocument>> {
    match serde_json::from_str::<FullRead>(raw) {
        Ok(FullRead::Versioned {
            version,
            saved_at,
            documents,
        }) => {
            check_version(key, version)?;
            Ok(Stamped {
                saved_at,
                items: documents,
            })
        }
        Ok(FullRead::Bare(documents)) => Ok(Stamped::unstamped(documents)),
        Err(e) => Err(corrupt(key, e.to_string())),
    }
}

pub fn decode_meta_stamped(key: &str, raw: &str) -> Result<Stamped<DocumentMeta>> {
    match serde_json::from_str::<MetaRead>(raw) {
        Ok(MetaRead::Versioned {
            version,
            saved_at,
            entries,
        }) => {
            check_version(key, version)?;
            Ok(Stamped {
                saved_at,
                items: entries,
            })
        }
        Ok(MetaRead::Bare(entries)) => Ok(Stamped::unstamped(entries)),
        Err(e) => Err(corrupt(key, e.to_string())),
    }
}

pub fn decode_full(key: &str, raw: &str) -> Result<Vec<UploadedDocument>> {
    decode_full_stamped(key, raw).map(|s| s.items)
}

pub fn decode_meta(key: &str, raw: &str) -> Result<Vec<DocumentMeta>> {
    decode_meta_stamped(key, raw).map(|s| s.items)
}
