use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::{PortalError, Result};
use crate::registry::DocumentRegistry;

/// Removes each id in turn. Unknown ids are reported and skipped.
pub async fn run(registry: &DocumentRegistry, ids: &[String]) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    for id in ids {
        match registry.remove(id).await {
            Ok(doc) => {
                result.add_message(CmdMessage::success(format!("Deleted \"{}\"", doc.title)));
                result.affected.push(EntrySummary::from(&doc));
            }
            Err(PortalError::NotFound(_)) => {
                result.add_message(CmdMessage::error(format!("No upload with id {}", id)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}
