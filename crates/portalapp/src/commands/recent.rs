use crate::catalog::Catalog;
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::Result;
use crate::manifest::Manifest;
use crate::registry::DocumentRegistry;

pub const DEFAULT_LIMIT: usize = 5;

pub fn run(manifest: &Manifest, registry: &DocumentRegistry, limit: usize) -> Result<CmdResult> {
    let listed: Vec<EntrySummary> = registry.with_documents(|uploads| {
        Catalog::new(manifest, uploads)
            .recent(limit)
            .into_iter()
            .map(EntrySummary::from)
            .collect()
    });
    let mut result = CmdResult::default();
    if listed.is_empty() {
        result.add_message(CmdMessage::info("No uploads yet."));
    }
    Ok(result.with_listed(listed))
}
