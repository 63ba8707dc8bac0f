use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::format_file_size;
use crate::store::CapacityStore;

pub async fn run(store: &CapacityStore) -> Result<CmdResult> {
    let report = store.capacity_report().await;
    let mut result = CmdResult::default();

    if report.large.is_none() {
        result.add_message(CmdMessage::warning(
            "Large-quota storage is not available; figures are for small-quota storage.",
        ));
    }
    if report.over_threshold() {
        let pct = report.ratio().map(|r| (r * 100.0).round() as u64).unwrap_or(100);
        result.add_message(CmdMessage::warning(format!(
            "{} storage is {}% full ({} used).",
            report.backend,
            pct,
            format_file_size(report.used_bytes)
        )));
    } else if report.small_over_threshold() {
        result.add_message(CmdMessage::warning(
            "Small-quota storage is nearly full; metadata writes may start failing.",
        ));
    }

    result.capacity = Some(report);
    Ok(result)
}
