//! # Catalog Merger
//!
//! Combines the read-only manifest with the uploads into one view. Entries borrow
//! from their sources; nothing here mutates or persists anything, and calling any
//! query twice with the same inputs yields the same output in the same order.
//!
//! ## Chapter Listing
//!
//! For one chapter: the manifest items in manifest order (separators dropped),
//! then the uploads whose `chapter_code` matches, in registry insertion order.
//! Listings are never re-sorted by date; only [`Catalog::recent`] does that.
//!
//! ## Entry Ids
//!
//! - Uploads keep their own id.
//! - Manifest documents get `manifest_<chapter code>/<title>`. When a title repeats
//!   inside a chapter, the n-th occurrence (n >= 2) becomes
//!   `manifest_<chapter code>/<title>#<n>`. Chapter codes are unique, so ids are
//!   unique across the catalog. See [`crate::manifest::Manifest::title_collisions`].
//!
//! ## Counts
//!
//! A chapter's direct count is its manifest documents plus its uploads. The total
//! adds the totals of all subchapters.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::manifest::Manifest;
use crate::model::{
    DocumentInfo, ManifestChapter, ManifestDocument, Status, UploadedDocument, MANIFEST_ID_PREFIX,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    Manifest,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Origin<'a> {
    Manifest(&'a ManifestDocument),
    Upload(&'a UploadedDocument),
}

impl Origin<'_> {
    pub fn kind(&self) -> OriginKind {
        match self {
            Origin::Manifest(_) => OriginKind::Manifest,
            Origin::Upload(_) => OriginKind::Upload,
        }
    }

    fn info(&self) -> &dyn DocumentInfo {
        match self {
            Origin::Manifest(doc) => *doc,
            Origin::Upload(doc) => *doc,
        }
    }
}

/// One row of the unified catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry<'a> {
    pub id: String,
    pub chapter_code: &'a str,
    pub origin: Origin<'a>,
}

impl CatalogEntry<'_> {
    pub fn as_upload(&self) -> Option<&UploadedDocument> {
        match self.origin {
            Origin::Upload(doc) => Some(doc),
            Origin::Manifest(_) => None,
        }
    }

    pub fn as_manifest(&self) -> Option<&ManifestDocument> {
        match self.origin {
            Origin::Manifest(doc) => Some(doc),
            Origin::Upload(_) => None,
        }
    }
}

impl DocumentInfo for CatalogEntry<'_> {
    fn title(&self) -> &str {
        self.origin.info().title()
    }
    fn tags(&self) -> &[String] {
        self.origin.info().tags()
    }
    fn status(&self) -> Status {
        self.origin.info().status()
    }
    fn date(&self) -> Option<NaiveDate> {
        self.origin.info().date()
    }
}

pub fn manifest_entry_id(chapter_code: &str, title: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        format!("{}{}/{}", MANIFEST_ID_PREFIX, chapter_code, title)
    } else {
        format!("{}{}/{}#{}", MANIFEST_ID_PREFIX, chapter_code, title, occurrence)
    }
}

fn manifest_entries(chapter: &ManifestChapter) -> Vec<CatalogEntry<'_>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    chapter
        .documents()
        .map(|doc| {
            let occurrence = seen.entry(doc.title.as_str()).or_insert(0);
            *occurrence += 1;
            CatalogEntry {
                id: manifest_entry_id(&chapter.code, &doc.title, *occurrence),
                chapter_code: &chapter.code,
                origin: Origin::Manifest(doc),
            }
        })
        .collect()
}

fn upload_entry(doc: &UploadedDocument) -> CatalogEntry<'_> {
    CatalogEntry {
        id: doc.id.clone(),
        chapter_code: &doc.chapter_code,
        origin: Origin::Upload(doc),
    }
}

/// Merged listing for one chapter: manifest items, then matching uploads.
pub fn merge_chapter<'a>(
    chapter: &'a ManifestChapter,
    uploads: &'a [UploadedDocument],
) -> Vec<CatalogEntry<'a>> {
    let mut entries = manifest_entries(chapter);
    entries.extend(
        uploads
            .iter()
            .filter(|d| d.chapter_code == chapter.code)
            .map(upload_entry),
    );
    entries
}

/// Documents per chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterCount {
    pub code: String,
    pub title: String,
    pub depth: usize,
    /// Manifest documents plus uploads in this chapter itself.
    pub direct: usize,
    /// `direct` plus the totals of all subchapters.
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    LastWeek,
    LastMonth,
}

impl DateWindow {
    pub fn days(self) -> i64 {
        match self {
            DateWindow::LastWeek => 7,
            DateWindow::LastMonth => 30,
        }
    }

    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= today - Duration::days(self.days())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub status: Option<Status>,
    pub window: Option<DateWindow>,
}

impl EntryFilter {
    /// Entries without a date never match a date window.
    pub fn matches(&self, entry: &CatalogEntry<'_>, today: NaiveDate) -> bool {
        if let Some(status) = self.status {
            if entry.status() != status {
                return false;
            }
        }
        if let Some(window) = self.window {
            return entry
                .date()
                .map(|d| window.contains(d, today))
                .unwrap_or(false);
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.window.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Manifest documents (separators excluded) plus uploads.
    pub total: usize,
    pub uploaded: usize,
    /// Dated within the last seven days.
    pub recent: usize,
    /// Anything not obsolete.
    pub active: usize,
    pub by_status: Vec<(Status, usize)>,
    /// Totals of the top-level chapters.
    pub by_chapter: Vec<(String, usize)>,
}

/// Read-only view over a manifest and a set of uploads.
#[derive(Clone, Copy)]
pub struct Catalog<'a> {
    manifest: &'a Manifest,
    uploads: &'a [UploadedDocument],
}

impl<'a> Catalog<'a> {
    pub fn new(manifest: &'a Manifest, uploads: &'a [UploadedDocument]) -> Self {
        Self { manifest, uploads }
    }

    /// Merged listing for `code`. Uploads pointing at a code the manifest lacks
    /// are still listed.
    pub fn chapter(&self, code: &str) -> Vec<CatalogEntry<'a>> {
        match self.manifest.find_chapter(code) {
            Some(chapter) => merge_chapter(chapter, self.uploads),
            None => self
                .uploads
                .iter()
                .filter(|d| d.chapter_code == code)
                .map(upload_entry)
                .collect(),
        }
    }

    pub fn chapter_filtered(
        &self,
        code: &str,
        filter: &EntryFilter,
        today: NaiveDate,
    ) -> Vec<CatalogEntry<'a>> {
        self.chapter(code)
            .into_iter()
            .filter(|e| filter.matches(e, today))
            .collect()
    }

    /// Every entry in the catalog: chapters in walk order, then uploads whose
    /// chapter is not in the manifest.
    pub fn entries(&self) -> Vec<CatalogEntry<'a>> {
        let mut out = Vec::new();
        for (_, chapter) in self.manifest.walk() {
            out.extend(merge_chapter(chapter, self.uploads));
        }
        out.extend(
            self.uploads
                .iter()
                .filter(|d| !self.manifest.has_chapter(&d.chapter_code))
                .map(upload_entry),
        );
        out
    }

    pub fn find(&self, id: &str) -> Option<CatalogEntry<'a>> {
        self.entries().into_iter().find(|e| e.id == id)
    }

    pub fn direct_count(&self, chapter: &ManifestChapter) -> usize {
        chapter.documents().count()
            + self
                .uploads
                .iter()
                .filter(|d| d.chapter_code == chapter.code)
                .count()
    }

    pub fn total_count(&self, chapter: &ManifestChapter) -> usize {
        self.direct_count(chapter)
            + chapter
                .subchapters
                .iter()
                .map(|sub| self.total_count(sub))
                .sum::<usize>()
    }

    /// Counts for every chapter and subchapter, in walk order.
    pub fn counts(&self) -> Vec<ChapterCount> {
        self.manifest
            .walk()
            .into_iter()
            .map(|(depth, chapter)| ChapterCount {
                code: chapter.code.clone(),
                title: chapter.title.clone(),
                depth,
                direct: self.direct_count(chapter),
                total: self.total_count(chapter),
            })
            .collect()
    }

    /// Uploads, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&'a UploadedDocument> {
        let mut uploads: Vec<&UploadedDocument> = self.uploads.iter().collect();
        uploads.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        uploads.truncate(limit);
        uploads
    }

    /// Case-insensitive substring match on title, tags and chapter code.
    pub fn search(&self, query: &str) -> Vec<CatalogEntry<'a>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.entries()
            .into_iter()
            .filter(|e| {
                e.title().to_lowercase().contains(&needle)
                    || e.chapter_code.to_lowercase().contains(&needle)
                    || e.tags().iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn stats(&self, today: NaiveDate) -> CatalogStats {
        let entries = self.entries();
        let by_status = Status::ALL
            .iter()
            .map(|s| (*s, entries.iter().filter(|e| e.status() == *s).count()))
            .collect();
        let by_chapter = self
            .manifest
            .chapters()
            .iter()
            .map(|c| (c.code.clone(), self.total_count(c)))
            .collect();
        CatalogStats {
            total: entries.len(),
            uploaded: self.uploads.len(),
            recent: entries
                .iter()
                .filter(|e| {
                    e.date()
                        .map(|d| DateWindow::LastWeek.contains(d, today))
                        .unwrap_or(false)
                })
                .count(),
            active: entries
                .iter()
                .filter(|e| e.status() != Status::Obsolete)
                .count(),
            by_status,
            by_chapter,
        }
    }
}
