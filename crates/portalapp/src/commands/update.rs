use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::{PortalError, Result};
use crate::model::DocumentPatch;
use crate::registry::DocumentRegistry;
use crate::tags::parse_tags;

/// Raw user edits: a new title and/or a comma-separated tag string.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub tags: Option<String>,
}

fn to_patch(update: DocumentUpdate) -> Result<DocumentPatch> {
    let title = match update.title {
        Some(title) if title.trim().is_empty() => {
            return Err(PortalError::InvalidUpload("title cannot be empty".into()))
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };
    let tags = update
        .tags
        .map(|raw| parse_tags(&raw))
        .transpose()
        .map_err(|e| PortalError::InvalidUpload(e.to_string()))?;
    Ok(DocumentPatch { title, tags })
}

pub async fn run(
    registry: &DocumentRegistry,
    id: &str,
    update: DocumentUpdate,
) -> Result<CmdResult> {
    let patch = to_patch(update)?;
    let mut result = CmdResult::default();
    if patch.is_empty() {
        result.add_message(CmdMessage::info("Nothing to update."));
        return Ok(result);
    }

    let doc = registry.update(id, patch).await?;
    result.add_message(CmdMessage::success(format!("Updated \"{}\"", doc.title)));
    Ok(result.with_affected(vec![EntrySummary::from(&doc)]))
}
