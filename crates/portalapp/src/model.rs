//! # Domain Model
//!
//! This module defines the records the portal works with:
//!
//! - [`ManifestChapter`] / [`ManifestDocument`]: the read-only taxonomy loaded once per
//!   session from the manifest file. Never written back.
//! - [`UploadedDocument`]: a user upload, owned by the
//!   [`DocumentRegistry`](crate::registry::DocumentRegistry). Storage only ever holds
//!   serialized copies.
//! - [`DocumentMeta`]: the blob-free projection of an upload that is cached in the
//!   small-quota backend.
//!
//! ## Legacy Field Names
//!
//! Older portal builds wrote uploads with Spanish field names (`titulo`, `capitulo`,
//! `fileData`, `estado`, ...) and numeric ids. Deserialization accepts both spellings;
//! serialization always writes the camelCase names.
//!
//! ## Identity
//!
//! Upload ids are generated by [`IdGenerator`]: `upload_<millis>_<seq><random>`. The
//! sequence component keeps ids distinct even when many are minted within the same
//! millisecond. Manifest documents carry no id of their own; see
//! [`crate::catalog`] for how entry ids are synthesized.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::codec::EncodedBlob;

pub const UPLOAD_ID_PREFIX: &str = "upload_";
pub const MANIFEST_ID_PREFIX: &str = "manifest_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Status {
    #[default]
    Approved,
    Draft,
    Obsolete,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Approved, Status::Draft, Status::Obsolete];

    fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approved" | "aprobado" => Some(Status::Approved),
            "draft" | "borrador" => Some(Status::Draft),
            "obsolete" | "obsoleto" => Some(Status::Obsolete),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Approved => "Approved",
            Status::Draft => "Draft",
            Status::Obsolete => "Obsolete",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::parse_lenient(s).ok_or_else(|| format!("Unknown status: {}", s))
    }
}

// Unknown or missing statuses fall back to Approved, which is what the portal
// always displayed for them.
impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(Status::parse_lenient)
            .unwrap_or_default())
    }
}

/// Shared read-only view over manifest and uploaded documents.
pub trait DocumentInfo {
    fn title(&self) -> &str;
    fn tags(&self) -> &[String];
    fn status(&self) -> Status;
    fn date(&self) -> Option<NaiveDate>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(alias = "titulo", alias = "nombre", default)]
    pub title: String,
    #[serde(alias = "ruta", default)]
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "estado", default)]
    pub status: Status,
    #[serde(
        alias = "fecha",
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
    #[serde(alias = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(alias = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub separator: bool,
}

impl ManifestDocument {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            tags: Vec::new(),
            status: Status::Approved,
            date: None,
            description: None,
            kind: None,
            separator: false,
        }
    }

    /// Structural placeholder nodes are not documents.
    pub fn is_separator(&self) -> bool {
        self.separator
            || self
                .kind
                .as_deref()
                .map(|k| matches!(k.to_lowercase().as_str(), "separator" | "separador"))
                .unwrap_or(false)
    }
}

impl DocumentInfo for ManifestDocument {
    fn title(&self) -> &str {
        &self.title
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn status(&self) -> Status {
        self.status
    }
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestChapter {
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(alias = "titulo", default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ManifestDocument>,
    #[serde(alias = "subcapitulos", default)]
    pub subchapters: Vec<ManifestChapter>,
}

impl ManifestChapter {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            items: Vec::new(),
            subchapters: Vec::new(),
        }
    }

    /// Items that are real documents, in manifest order.
    pub fn documents(&self) -> impl Iterator<Item = &ManifestDocument> {
        self.items.iter().filter(|d| !d.is_separator())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "titulo")]
    pub title: String,
    #[serde(alias = "capitulo", alias = "chapter")]
    pub chapter_code: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "nombreOriginal", default)]
    pub file_name: String,
    #[serde(alias = "fileSize", alias = "tamaño", default)]
    pub file_size_bytes: u64,
    #[serde(alias = "fileType", alias = "tipo", default)]
    pub mime_type: String,
    #[serde(
        alias = "uploadDate",
        alias = "fecha",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub upload_timestamp: DateTime<Utc>,
    #[serde(alias = "estado", default)]
    pub status: Status,
    #[serde(alias = "fileData", default, skip_serializing_if = "Option::is_none")]
    pub encoded_blob: Option<EncodedBlob>,
}

impl UploadedDocument {
    /// Rebuilds a blob-less document from its cached metadata.
    pub fn from_meta(meta: &DocumentMeta) -> Self {
        Self {
            id: meta.id.clone(),
            title: meta.title.clone(),
            chapter_code: meta.chapter_code.clone(),
            tags: meta.tags.clone(),
            file_name: meta.file_name.clone().unwrap_or_default(),
            file_size_bytes: meta.file_size_bytes.unwrap_or(0),
            mime_type: meta.mime_type.clone().unwrap_or_default(),
            upload_timestamp: meta.date,
            status: meta.status.unwrap_or_default(),
            encoded_blob: None,
        }
    }

    pub fn has_blob(&self) -> bool {
        self.encoded_blob.is_some()
    }

    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta::from(self)
    }
}

impl DocumentInfo for UploadedDocument {
    fn title(&self) -> &str {
        &self.title
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn status(&self) -> Status {
        self.status
    }
    fn date(&self) -> Option<NaiveDate> {
        Some(self.upload_timestamp.date_naive())
    }
}

/// Blob-free projection of an [`UploadedDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "titulo")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(alias = "capitulo", alias = "chapter")]
    pub chapter_code: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(alias = "fileSize", alias = "tamaño", default, skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(alias = "fileType", alias = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl From<&UploadedDocument> for DocumentMeta {
    fn from(doc: &UploadedDocument) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            date: doc.upload_timestamp,
            chapter_code: doc.chapter_code.clone(),
            tags: doc.tags.clone(),
            file_name: Some(doc.file_name.clone()),
            file_size_bytes: Some(doc.file_size_bytes),
            mime_type: Some(doc.mime_type.clone()),
            status: Some(doc.status),
        }
    }
}

/// Everything needed to register a new upload, after the file has been encoded.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub title: String,
    pub chapter_code: String,
    pub tags: Vec<String>,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub mime_type: String,
    pub status: Status,
    pub encoded_blob: EncodedBlob,
}

/// Edits allowed on an existing upload: title and tags only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl DocumentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            tags: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none()
    }
}

/// Mints upload ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seq: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();
        format!("{}{}_{:04x}{}", UPLOAD_ID_PREFIX, millis, seq, &random[..8])
    }
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match raw {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                parse_date(&s)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            }),
        Some(serde_json::Value::Number(n)) => {
            n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis)
        }
        _ => None,
    };
    Ok(parsed.unwrap_or_default())
}
