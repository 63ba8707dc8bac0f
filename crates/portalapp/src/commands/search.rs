use crate::catalog::Catalog;
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::Result;
use crate::manifest::Manifest;
use crate::registry::DocumentRegistry;

pub fn run(manifest: &Manifest, registry: &DocumentRegistry, query: &str) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if query.trim().is_empty() {
        result.add_message(CmdMessage::warning("Search term is empty."));
        return Ok(result);
    }

    let listed: Vec<EntrySummary> = registry.with_documents(|uploads| {
        Catalog::new(manifest, uploads)
            .search(query)
            .iter()
            .map(EntrySummary::from)
            .collect()
    });
    if listed.is_empty() {
        result.add_message(CmdMessage::info(format!("No documents match \"{}\".", query.trim())));
    }
    Ok(result.with_listed(listed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OriginKind;
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};

    #[tokio::test]
    async fn finds_manifest_and_upload_entries() {
        let env = env();
        env.registry
            .add(NewUpload {
                title: "Informe".into(),
                chapter_code: "05".into(),
                tags: vec!["Control".into()],
                file_name: "i.pdf".into(),
                file_size_bytes: 1,
                mime_type: "application/pdf".into(),
                status: Status::Approved,
                encoded_blob: crate::codec::encode(b"x", "application/pdf"),
            })
            .await
            .unwrap();

        let result = run(&env.manifest, &env.registry, "CONTROL").unwrap();
        let origins: Vec<OriginKind> = result.listed.iter().map(|e| e.origin).collect();
        assert_eq!(origins, vec![OriginKind::Manifest, OriginKind::Upload]);
        env.registry.settle().await;
    }

    #[test]
    fn chapter_code_matches() {
        let env = env();
        let result = run(&env.manifest, &env.registry, "01.1").unwrap();
        assert_eq!(result.listed.len(), 1);
        assert_eq!(result.listed[0].title, "Control de Documentos");
    }

    #[test]
    fn blank_query_warns() {
        let env = env();
        let result = run(&env.manifest, &env.registry, "   ").unwrap();
        assert!(result.listed.is_empty());
        assert_eq!(result.messages[0].content, "Search term is empty.");
    }
}
