use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::recovery;
use crate::store::{CapacityStore, Loaded};

/// Probes storage the way startup recovery does, without changing anything.
pub async fn run(store: &CapacityStore, key: &str) -> Result<CmdResult> {
    let probe = recovery::probe(store, key).await;
    let mut result = CmdResult::default();

    result.add_message(CmdMessage::info(format!(
        "Recovery would use: {} ({} document(s)).",
        probe.source.describe(),
        probe.documents.len()
    )));
    result.add_message(CmdMessage::info(format!(
        "Stored snapshot: {}.",
        describe_loaded(&store.get(key).await)
    )));

    for skipped in &probe.skipped {
        result.add_message(CmdMessage::warning(format!(
            "  - Skipped {}: {}",
            skipped.location, skipped.reason
        )));
    }

    let missing = probe.missing_blobs();
    if probe.partial.is_empty() && !probe.is_stale() && missing == 0 && probe.skipped.is_empty() {
        result.add_message(CmdMessage::success("No inconsistencies found."));
        return Ok(result);
    }
    if !probe.partial.is_empty() {
        result.add_message(CmdMessage::warning(format!(
            "  - {} upload(s) are in the metadata but not in the full snapshot: {}",
            probe.partial.len(),
            probe.partial.join(", ")
        )));
    }
    if !probe.dropped.is_empty() {
        result.add_message(CmdMessage::warning(format!(
            "  - {} deleted upload(s) are still in the full snapshot: {}",
            probe.dropped.len(),
            probe.dropped.join(", ")
        )));
    }
    if !probe.amended.is_empty() {
        result.add_message(CmdMessage::warning(format!(
            "  - {} upload(s) have newer titles or tags in the metadata: {}",
            probe.amended.len(),
            probe.amended.join(", ")
        )));
    }
    if missing > 0 {
        result.add_message(CmdMessage::warning(format!(
            "  - {} upload(s) would start without their content.",
            missing
        )));
    }
    Ok(result)
}

fn describe_loaded(loaded: &Loaded) -> String {
    match loaded {
        Loaded::Full { from, documents } => {
            format!("full, {} storage ({} document(s))", from, documents.len())
        }
        Loaded::MetadataOnly(entries) => format!("metadata only ({} entries)", entries.len()),
        Loaded::Empty => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::model::{Status, UploadedDocument};
    use crate::snapshot;
    use crate::store::mem_backend::{MemKeyValueBackend, MemObjectBackend};
    use crate::store::KeyValueBackend;
    use chrono::Utc;
    use std::sync::Arc;

    const KEY: &str = "uploadedDocuments";

    fn doc(id: &str) -> UploadedDocument {
        UploadedDocument {
            id: id.into(),
            title: id.into(),
            chapter_code: "05".into(),
            tags: Vec::new(),
            file_name: "f.txt".into(),
            file_size_bytes: 1,
            mime_type: "text/plain".into(),
            upload_timestamp: Utc::now(),
            status: Status::Approved,
            encoded_blob: Some(codec::encode(b"x", "text/plain")),
        }
    }

    #[tokio::test]
    async fn empty_storage_is_consistent() {
        let store = CapacityStore::new(
            Arc::new(MemObjectBackend::new()),
            Arc::new(MemKeyValueBackend::new()),
        );
        let result = run(&store, KEY).await.unwrap();
        assert!(result.messages[0].content.contains("nothing stored"));
        assert_eq!(result.messages[1].content, "Stored snapshot: none.");
        assert!(result.messages[2].content.contains("No inconsistencies"));
    }

    #[tokio::test]
    async fn reports_deletes_and_edits_missing_from_full_snapshot() {
        let large = Arc::new(MemObjectBackend::new());
        let small = Arc::new(MemKeyValueBackend::new());
        let store = CapacityStore::new(large.clone(), small.clone());
        store
            .put_full(KEY, &[doc("upload_keep"), doc("upload_gone")])
            .await
            .unwrap();
        let mut renamed = doc("upload_keep");
        renamed.title = "Renamed".into();
        store.put_metadata(KEY, &[renamed]).unwrap();
        let before = large.raw(KEY);

        let result = run(&store, KEY).await.unwrap();

        assert!(result
            .messages
            .iter()
            .any(|m| m.content == "Stored snapshot: full, large-quota storage (2 document(s))."));
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("deleted upload(s)") && m.content.contains("upload_gone")));
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("newer titles or tags") && m.content.contains("upload_keep")));
        assert!(!result
            .messages
            .iter()
            .any(|m| m.content.contains("No inconsistencies")));
        assert_eq!(large.raw(KEY), before);
    }

    #[tokio::test]
    async fn reports_partial_state_without_writing() {
        let large = Arc::new(MemObjectBackend::new());
        let small = Arc::new(MemKeyValueBackend::new());
        let store = CapacityStore::new(large.clone(), small.clone());
        store.put_full(KEY, &[doc("upload_a")]).await.unwrap();
        store.put_metadata(KEY, &[doc("upload_a"), doc("upload_b")]).unwrap();
        let before = small.get(&snapshot::meta_key(KEY)).unwrap();

        let result = run(&store, KEY).await.unwrap();

        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("upload_b") && m.content.contains("not in the full snapshot")));
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("1 upload(s) would start without")));
        assert_eq!(small.get(&snapshot::meta_key(KEY)).unwrap(), before);
    }
}
