//! # Rendering
//!
//! Turns a [`CmdResult`] into terminal text. Every `render_*` function returns a
//! `String` so layouts can be tested without a terminal; the `print_*` wrappers
//! write them out.
//!
//! ## Entry Layout
//!
//! ```text
//! ● Manual de Calidad [manual]            Approved     2024-03-01  manifest_01/Manual de Calidad
//! ```
//!
//! - marker (2 chars): `●` for uploads, blank for manifest documents
//! - title (fill): truncated to fit, tags appended in brackets
//! - status (10 chars)
//! - when (14 chars, right-aligned): the document date, or how long ago it was uploaded
//! - id: what `view`, `update` and `delete` take

use super::setup::OutputMode;
use super::styles::PALETTE;
use chrono::{DateTime, Utc};
use portalapp::catalog::{CatalogStats, ChapterCount, OriginKind};
use portalapp::commands::{CmdMessage, CmdResult, EntrySummary};
use portalapp::notice::Notice;
use portalapp::store::CapacityReport;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const LINE_WIDTH: usize = 100;
pub const COL_MARKER: usize = 2;
pub const COL_STATUS: usize = 10;
pub const COL_TIME: usize = 14;
pub const COL_TITLE_MIN: usize = 20;
pub const UPLOAD_MARKER: &str = "●";

pub fn print_result(result: &CmdResult, mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputMode::Text => print!("{}", render_result(result)),
    }
    Ok(())
}

/// Notices go to stderr so they never mix with listings piped elsewhere.
pub fn print_notices(notices: &[Notice]) {
    let output = render_notices(notices);
    if !output.is_empty() {
        eprint!("{}", output);
    }
}

pub fn render_result(result: &CmdResult) -> String {
    let mut out = String::new();
    if !result.chapter_counts.is_empty() {
        out.push_str(&render_chapters(&result.chapter_counts));
    }
    if !result.affected.is_empty() {
        out.push_str(&render_entries(&result.affected));
    }
    if !result.listed.is_empty() {
        out.push_str(&render_entries(&result.listed));
    }
    if let Some(stats) = &result.stats {
        out.push_str(&render_stats(stats));
    }
    if let Some(report) = &result.capacity {
        out.push_str(&render_capacity(report));
    }
    for path in &result.paths {
        out.push_str(&format!("{}\n", path.display()));
    }
    out.push_str(&render_messages(&result.messages));
    out
}

pub fn render_chapters(counts: &[ChapterCount]) -> String {
    let code_width = counts
        .iter()
        .map(|c| c.code.width() + c.depth * 2)
        .max()
        .unwrap_or(0);
    counts
        .iter()
        .map(|c| {
            let indent = "  ".repeat(c.depth);
            let code = format!("{}{}", indent, c.code);
            let pad = code_width.saturating_sub(code.width());
            let counts = if c.direct == c.total {
                format!("({})", c.total)
            } else {
                format!("({} / {})", c.direct, c.total)
            };
            format!(
                "{}{}  {} {}\n",
                PALETTE.code.apply_to(code),
                " ".repeat(pad),
                PALETTE.title.apply_to(&c.title),
                PALETTE.muted.apply_to(counts)
            )
        })
        .collect()
}

pub fn render_entries(entries: &[EntrySummary]) -> String {
    entries.iter().map(render_entry).collect()
}

fn render_entry(entry: &EntrySummary) -> String {
    let marker = match entry.origin {
        OriginKind::Upload => format!("{} ", PALETTE.upload.apply_to(UPLOAD_MARKER)),
        OriginKind::Manifest => " ".repeat(COL_MARKER),
    };

    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", entry.tags.join(", "))
    };
    let title_width = LINE_WIDTH
        .saturating_sub(COL_MARKER + COL_STATUS + COL_TIME + entry.id.width() + 4)
        .max(COL_TITLE_MIN);
    let title = truncate_to_width(&entry.title, title_width.saturating_sub(tags.width()));
    let title_pad = title_width.saturating_sub(title.width() + tags.width());

    let when = match (entry.uploaded_at, entry.date) {
        (Some(at), _) => format_time_ago(at),
        (None, Some(date)) => format!("{:>width$}", date.to_string(), width = COL_TIME),
        (None, None) => " ".repeat(COL_TIME),
    };
    let status = format!("{:<width$}", entry.status.to_string(), width = COL_STATUS);

    format!(
        "{}{}{}{}  {}{}  {}\n",
        marker,
        PALETTE.regular.apply_to(title),
        PALETTE.muted.apply_to(tags),
        " ".repeat(title_pad),
        PALETTE.status(entry.status).apply_to(status),
        PALETTE.time.apply_to(when),
        PALETTE.faint.apply_to(&entry.id)
    )
}

pub fn render_stats(stats: &CatalogStats) -> String {
    let mut out = format!(
        "{} {}\n{} {}\n{} {}\n{} {}\n",
        PALETTE.title.apply_to("Documents:"),
        stats.total,
        PALETTE.title.apply_to("Uploaded: "),
        stats.uploaded,
        PALETTE.title.apply_to("Recent:   "),
        stats.recent,
        PALETTE.title.apply_to("Active:   "),
        stats.active,
    );
    out.push('\n');
    for (status, count) in &stats.by_status {
        let label = format!("{:<width$}", status.to_string(), width = COL_STATUS);
        out.push_str(&format!(
            "  {} {}\n",
            PALETTE.status(*status).apply_to(label),
            count
        ));
    }
    out.push('\n');
    for (code, count) in &stats.by_chapter {
        let code = format!("{:<8}", code);
        out.push_str(&format!("  {} {}\n", PALETTE.code.apply_to(code), count));
    }
    out
}

pub fn render_capacity(report: &CapacityReport) -> String {
    let headline = match (report.quota_bytes, report.ratio()) {
        (Some(quota), Some(ratio)) => format!(
            "{} used of {} ({:.0}%)",
            format_bytes(report.used_bytes),
            format_bytes(quota),
            ratio * 100.0
        ),
        _ => format!("{} used", format_bytes(report.used_bytes)),
    };
    let style = if report.over_threshold() {
        &PALETTE.warning
    } else {
        &PALETTE.regular
    };
    let mut out = format!(
        "{} {} {}\n",
        PALETTE.title.apply_to("Storage:"),
        style.apply_to(headline),
        PALETTE.muted.apply_to(format!("({})", report.backend))
    );
    for (label, usage) in [("large", &report.large), ("small", &report.small)] {
        let line = match usage {
            Some(u) => match u.quota_bytes {
                Some(q) => format!("{} / {}", format_bytes(u.used_bytes), format_bytes(q)),
                None => format_bytes(u.used_bytes),
            },
            None => "unavailable".to_string(),
        };
        let label = format!("{:<6}", label);
        out.push_str(&format!("  {} {}\n", PALETTE.muted.apply_to(label), line));
    }
    out
}

pub fn render_messages(messages: &[CmdMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}\n", PALETTE.message(m.level).apply_to(&m.content)))
        .collect()
}

pub fn render_notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|n| format!("{}\n", PALETTE.message(n.level).apply_to(&n.message)))
        .collect()
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Cuts `text` to at most `width` columns, ending in `…` when shortened.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = COL_TIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portalapp::commands::MessageLevel;
    use portalapp::model::Status;
    use portalapp::store::BackendKind;
    use portalapp::store::Usage;

    fn plain(text: String) -> String {
        console::strip_ansi_codes(&text).into_owned()
    }

    fn manifest_entry(title: &str) -> EntrySummary {
        EntrySummary {
            id: format!("manifest_01/{}", title),
            chapter_code: "01".into(),
            origin: OriginKind::Manifest,
            title: title.into(),
            status: Status::Approved,
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            tags: vec!["manual".into()],
            locator: Some("docs/01/manual.pdf".into()),
            file_name: None,
            file_size_bytes: None,
            uploaded_at: None,
            has_blob: false,
        }
    }

    #[test]
    fn truncates_by_display_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefghij", 5), "abcd…");
        assert_eq!(truncate_to_width("日本語テキスト", 5), "日本…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn entry_line_shows_title_tags_date_and_id() {
        let out = plain(render_entries(&[manifest_entry("Manual de Calidad")]));
        assert!(out.contains("Manual de Calidad [manual]"));
        assert!(out.contains("Approved"));
        assert!(out.contains("2024-03-01"));
        assert!(out.ends_with("manifest_01/Manual de Calidad\n"));
    }

    #[test]
    fn long_titles_are_truncated() {
        let mut entry = manifest_entry("short");
        entry.title = "x".repeat(300);
        let out = plain(render_entries(&[entry]));
        assert!(out.contains('…'));
        assert!(!out.contains(&"x".repeat(LINE_WIDTH)));
    }

    #[test]
    fn chapter_tree_indents_subchapters() {
        let counts = vec![
            ChapterCount {
                code: "01".into(),
                title: "Sistema".into(),
                depth: 0,
                direct: 1,
                total: 2,
            },
            ChapterCount {
                code: "01.1".into(),
                title: "Procedimientos".into(),
                depth: 1,
                direct: 1,
                total: 1,
            },
        ];
        let out = plain(render_chapters(&counts));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("01"));
        assert!(lines[0].contains("(1 / 2)"));
        assert!(lines[1].starts_with("  01.1"));
        assert!(lines[1].contains("(1)"));
    }

    #[test]
    fn capacity_shows_percentage_and_unavailable_backend() {
        let report = CapacityReport {
            backend: BackendKind::Small,
            used_bytes: 512,
            quota_bytes: Some(1024),
            large: None,
            small: Some(Usage {
                used_bytes: 512,
                quota_bytes: Some(1024),
            }),
            warn_ratio: 0.8,
        };
        let out = plain(render_capacity(&report));
        assert!(out.contains("512 B used of 1.0 KB (50%)"));
        assert!(out.contains("unavailable"));
    }

    #[test]
    fn result_includes_messages() {
        let mut result = CmdResult::default();
        result.add_message(CmdMessage {
            level: MessageLevel::Success,
            content: "Deleted 1 document".into(),
        });
        assert_eq!(plain(render_result(&result)), "Deleted 1 document\n");
    }
}
