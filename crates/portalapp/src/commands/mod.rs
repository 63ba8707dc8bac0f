//! # Command Layer
//!
//! The **business logic** of every user action. Each command lives in its own
//! submodule and works on the registry, the manifest and the store directly.
//!
//! ## Role and Responsibilities
//!
//! Commands:
//! - Validate user input (upload rules, tag syntax, chapter codes)
//! - Drive the [`DocumentRegistry`](crate::registry::DocumentRegistry) and the
//!   [`Catalog`](crate::catalog::Catalog)
//! - Return a structured [`CmdResult`] with summaries and messages
//!
//! ## What Commands Do NOT Do
//!
//! - **Terminal output**: no stdout or stderr, rendering is the client's job
//! - **Argument parsing** and **exit codes**
//! - **Prompts**: a command that needs confirmation returns data, the UI decides
//!
//! Commands that move files (`upload`, `view`, `export`, `import`) take explicit
//! paths; nothing depends on the process working directory.
//!
//! ## Command Modules
//!
//! - [`upload`]: Validate and register a new upload
//! - [`update`]: Rename or retag an upload
//! - [`delete`]: Remove uploads
//! - [`clear`]: Remove every upload
//! - [`list`]: Chapter tree with counts, merged chapter listings
//! - [`recent`]: Newest uploads
//! - [`search`]: Search across manifest and uploads
//! - [`stats`]: Catalog statistics
//! - [`view`]: Write an upload's file out, or report a manifest locator
//! - [`capacity`]: Storage usage of both backends
//! - [`doctor`]: Read-only recovery probe
//! - [`export`] / [`import`]: Archive round trip
//! - [`favorites`]: Favorite entries

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::catalog::{CatalogEntry, CatalogStats, ChapterCount, Origin, OriginKind};
use crate::model::{DocumentInfo, Status, UploadedDocument};
use crate::store::CapacityReport;

pub mod capacity;
pub mod clear;
pub mod delete;
pub mod doctor;
pub mod export;
pub mod favorites;
pub mod import;
pub mod list;
pub mod recent;
pub mod search;
pub mod stats;
pub mod update;
pub mod upload;
pub mod view;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// Owned, blob-free view of a catalog entry, for clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub id: String,
    pub chapter_code: String,
    pub origin: OriginKind,
    pub title: String,
    pub status: Status,
    pub date: Option<NaiveDate>,
    pub tags: Vec<String>,
    /// Manifest documents: where the file lives.
    pub locator: Option<String>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Uploads only: whether the content is available in this session.
    pub has_blob: bool,
}

impl From<&UploadedDocument> for EntrySummary {
    fn from(doc: &UploadedDocument) -> Self {
        Self {
            id: doc.id.clone(),
            chapter_code: doc.chapter_code.clone(),
            origin: OriginKind::Upload,
            title: doc.title.clone(),
            status: doc.status,
            date: DocumentInfo::date(doc),
            tags: doc.tags.clone(),
            locator: None,
            file_name: Some(doc.file_name.clone()),
            file_size_bytes: Some(doc.file_size_bytes),
            uploaded_at: Some(doc.upload_timestamp),
            has_blob: doc.has_blob(),
        }
    }
}

impl From<&CatalogEntry<'_>> for EntrySummary {
    fn from(entry: &CatalogEntry<'_>) -> Self {
        match entry.origin {
            Origin::Upload(doc) => EntrySummary::from(doc),
            Origin::Manifest(doc) => Self {
                id: entry.id.clone(),
                chapter_code: entry.chapter_code.to_string(),
                origin: OriginKind::Manifest,
                title: doc.title.clone(),
                status: doc.status,
                date: doc.date,
                tags: doc.tags.clone(),
                locator: Some(doc.path.clone()),
                file_name: None,
                file_size_bytes: None,
                uploaded_at: None,
                has_blob: false,
            },
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CmdResult {
    /// Uploads created, changed or removed by the command.
    pub affected: Vec<EntrySummary>,
    /// Entries to display.
    pub listed: Vec<EntrySummary>,
    pub chapter_counts: Vec<ChapterCount>,
    pub stats: Option<CatalogStats>,
    pub capacity: Option<CapacityReport>,
    /// Files written by the command.
    pub paths: Vec<PathBuf>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_affected(mut self, entries: Vec<EntrySummary>) -> Self {
        self.affected = entries;
        self
    }

    pub fn with_listed(mut self, entries: Vec<EntrySummary>) -> Self {
        self.listed = entries;
        self
    }

    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = paths;
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Error)
    }
}
