use chrono::NaiveDate;

use crate::catalog::{Catalog, EntryFilter};
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::Result;
use crate::manifest::Manifest;
use crate::registry::DocumentRegistry;

/// The chapter tree with direct and total counts.
pub fn chapters(manifest: &Manifest, registry: &DocumentRegistry) -> Result<CmdResult> {
    let counts = registry.with_documents(|uploads| Catalog::new(manifest, uploads).counts());
    let mut result = CmdResult::default();
    if counts.is_empty() {
        result.add_message(CmdMessage::info("The manifest has no chapters."));
    }
    result.chapter_counts = counts;
    Ok(result)
}

/// Merged listing of one chapter, optionally filtered.
pub fn run(
    manifest: &Manifest,
    registry: &DocumentRegistry,
    chapter_code: &str,
    filter: &EntryFilter,
    today: NaiveDate,
) -> Result<CmdResult> {
    let listed: Vec<EntrySummary> = registry.with_documents(|uploads| {
        Catalog::new(manifest, uploads)
            .chapter_filtered(chapter_code, filter, today)
            .iter()
            .map(EntrySummary::from)
            .collect()
    });

    let mut result = CmdResult::default();
    if !manifest.has_chapter(chapter_code) {
        result.add_message(CmdMessage::warning(format!(
            "Chapter {} is not in the manifest.",
            chapter_code
        )));
    }
    if listed.is_empty() {
        let text = if filter.is_empty() {
            "No documents in this chapter."
        } else {
            "No documents match the filter."
        };
        result.add_message(CmdMessage::info(text));
    }
    Ok(result.with_listed(listed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DateWindow, OriginKind};
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};

    fn upload(title: &str, chapter: &str) -> NewUpload {
        NewUpload {
            title: title.into(),
            chapter_code: chapter.into(),
            tags: Vec::new(),
            file_name: "f.pdf".into(),
            file_size_bytes: 10,
            mime_type: "application/pdf".into(),
            status: Status::Approved,
            encoded_blob: crate::codec::encode(b"%PDF", "application/pdf"),
        }
    }

    #[tokio::test]
    async fn chapter_counts_include_uploads() {
        let env = env();
        env.registry.add(upload("Sub", "01.1")).await.unwrap();

        let result = chapters(&env.manifest, &env.registry).unwrap();
        let codes: Vec<(&str, usize, usize)> = result
            .chapter_counts
            .iter()
            .map(|c| (c.code.as_str(), c.direct, c.total))
            .collect();
        assert_eq!(codes, vec![("01", 1, 3), ("01.1", 2, 2), ("05", 0, 0)]);
        env.registry.settle().await;
    }

    #[tokio::test]
    async fn lists_manifest_then_uploads() {
        let env = env();
        env.registry.add(upload("Extra", "01")).await.unwrap();
        let today = chrono::Utc::now().date_naive();

        let result = run(&env.manifest, &env.registry, "01", &EntryFilter::default(), today).unwrap();
        let rows: Vec<(OriginKind, &str)> = result
            .listed
            .iter()
            .map(|e| (e.origin, e.title.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (OriginKind::Manifest, "Manual de Calidad"),
                (OriginKind::Upload, "Extra"),
            ]
        );
        assert_eq!(result.listed[0].locator.as_deref(), Some("docs/01/manual.pdf"));
        env.registry.settle().await;
    }

    #[tokio::test]
    async fn filter_by_window_keeps_fresh_uploads_only() {
        let env = env();
        env.registry.add(upload("Fresh", "01")).await.unwrap();
        let today = chrono::Utc::now().date_naive();
        let filter = EntryFilter {
            status: None,
            window: Some(DateWindow::LastWeek),
        };

        let result = run(&env.manifest, &env.registry, "01", &filter, today).unwrap();
        assert_eq!(result.listed.len(), 1);
        assert_eq!(result.listed[0].title, "Fresh");
        env.registry.settle().await;
    }

    #[test]
    fn unknown_chapter_warns() {
        let env = env();
        let today = chrono::Utc::now().date_naive();
        let result = run(&env.manifest, &env.registry, "77", &EntryFilter::default(), today).unwrap();
        assert!(result.listed.is_empty());
        assert!(result.messages[0].content.contains("not in the manifest"));
    }
}
