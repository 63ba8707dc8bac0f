use chrono::NaiveDate;

use crate::catalog::Catalog;
use crate::commands::CmdResult;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::registry::DocumentRegistry;

pub fn run(manifest: &Manifest, registry: &DocumentRegistry, today: NaiveDate) -> Result<CmdResult> {
    let stats = registry.with_documents(|uploads| Catalog::new(manifest, uploads).stats(today));
    Ok(CmdResult {
        stats: Some(stats),
        ..Default::default()
    })
}
