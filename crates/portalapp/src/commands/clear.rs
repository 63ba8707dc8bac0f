use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::registry::DocumentRegistry;

pub async fn run(registry: &DocumentRegistry) -> Result<CmdResult> {
    let count = registry.clear().await;
    let mut result = CmdResult::default();
    if count == 0 {
        result.add_message(CmdMessage::info("No uploads to clear."));
    } else {
        result.add_message(CmdMessage::success(format!("Removed {} upload(s).", count)));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};
    use crate::snapshot;

    #[tokio::test]
    async fn clears_and_persists_empty_registry() {
        let env = env();
        env.registry
            .add(NewUpload {
                title: "A".into(),
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

        let result = run(&env.registry).await.unwrap();
        assert!(result.messages[0].content.contains("Removed 1"));
        env.registry.settle().await;

        assert!(env.registry.is_empty());
        let stored = env.large.raw("uploadedDocuments").unwrap();
        assert!(snapshot::decode_full("uploadedDocuments", &stored)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn clearing_empty_registry_says_so() {
        let env = env();
        let result = run(&env.registry).await.unwrap();
        assert!(result.messages[0].content.contains("No uploads"));
    }
}
