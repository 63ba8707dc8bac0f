use crate::catalog::Catalog;
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::{PortalError, Result};
use crate::favorites::Favorites;
use crate::manifest::Manifest;
use crate::registry::DocumentRegistry;

/// Toggles `id`, which must name an existing catalog entry.
pub fn toggle(
    favorites: &Favorites,
    manifest: &Manifest,
    registry: &DocumentRegistry,
    id: &str,
) -> Result<CmdResult> {
    let entry = registry.with_documents(|uploads| {
        Catalog::new(manifest, uploads)
            .find(id)
            .map(|e| EntrySummary::from(&e))
    });
    let entry = entry.ok_or_else(|| PortalError::NotFound(id.to_string()))?;

    let now_favorite = favorites.toggle(id)?;
    let mut result = CmdResult::default();
    let text = if now_favorite {
        format!("Added \"{}\" to favorites", entry.title)
    } else {
        format!("Removed \"{}\" from favorites", entry.title)
    };
    result.add_message(CmdMessage::success(text));
    Ok(result.with_affected(vec![entry]))
}

/// Favorite entries in the order they were added. Favorites whose entry is gone
/// are dropped from storage.
pub fn list(
    favorites: &Favorites,
    manifest: &Manifest,
    registry: &DocumentRegistry,
) -> Result<CmdResult> {
    let ids = favorites.list()?;
    let (listed, stale) = registry.with_documents(|uploads| {
        let catalog = Catalog::new(manifest, uploads);
        let mut listed = Vec::new();
        let mut stale = Vec::new();
        for id in &ids {
            match catalog.find(id) {
                Some(entry) => listed.push(EntrySummary::from(&entry)),
                None => stale.push(id.clone()),
            }
        }
        (listed, stale)
    });

    let mut result = CmdResult::default();
    if !stale.is_empty() {
        let dropped = favorites.prune(|id| !stale.iter().any(|s| s == id))?;
        tracing::debug!(dropped, "stale favorites pruned");
    }
    if listed.is_empty() {
        result.add_message(CmdMessage::info("No favorites yet."));
    }
    Ok(result.with_listed(listed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};

    #[tokio::test]
    async fn toggle_and_list() {
        let env = env();
        let favorites = Favorites::new(env.small.clone(), env.registry.key(), true);
        let doc = env
            .registry
            .add(NewUpload {
                title: "Acta".into(),
                chapter_code: "05".into(),
                tags: Vec::new(),
                file_name: "a.txt".into(),
                file_size_bytes: 1,
                mime_type: "text/plain".into(),
                status: Status::Approved,
                encoded_blob: crate::codec::encode(b"a", "text/plain"),
            })
            .await
            .unwrap();

        toggle(&favorites, &env.manifest, &env.registry, &doc.id).unwrap();
        toggle(&favorites, &env.manifest, &env.registry, "manifest_01/Manual de Calidad").unwrap();
        let result = list(&favorites, &env.manifest, &env.registry).unwrap();
        let titles: Vec<&str> = result.listed.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Acta", "Manual de Calidad"]);

        env.registry.remove(&doc.id).await.unwrap();
        let result = list(&favorites, &env.manifest, &env.registry).unwrap();
        assert_eq!(result.listed.len(), 1);
        assert_eq!(favorites.list().unwrap(), vec!["manifest_01/Manual de Calidad"]);
        env.registry.settle().await;
    }

    #[test]
    fn unknown_entry_is_not_found() {
        let env = env();
        let favorites = Favorites::new(env.small.clone(), env.registry.key(), true);
        assert!(matches!(
            toggle(&favorites, &env.manifest, &env.registry, "upload_nope"),
            Err(PortalError::NotFound(_))
        ));
    }

    #[test]
    fn disabled_feature_errors() {
        let env = env();
        let favorites = Favorites::new(env.small.clone(), env.registry.key(), false);
        assert!(matches!(
            list(&favorites, &env.manifest, &env.registry),
            Err(PortalError::FeatureDisabled(_))
        ));
    }
}
