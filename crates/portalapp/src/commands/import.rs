use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};

use crate::codec;
use crate::commands::export::{FILES_DIR, SNAPSHOT_ENTRY};
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::{PortalError, Result};
use crate::model::UploadedDocument;
use crate::registry::DocumentRegistry;
use crate::snapshot;

/// The upload id a `files/<id>/<name>` entry belongs to.
fn file_owner(path: &Path) -> Option<String> {
    let mut parts = path.components();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Component::Normal(dir)), Some(Component::Normal(id)), Some(Component::Normal(_)), None)
            if dir == FILES_DIR =>
        {
            id.to_str().map(str::to_string)
        }
        _ => None,
    }
}

struct Contents {
    documents: Vec<UploadedDocument>,
    files: HashMap<String, Vec<u8>>,
}

fn read_archive(path: &Path) -> Result<Contents> {
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut documents = None;
    let mut files = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();
        if entry_path == Path::new(SNAPSHOT_ENTRY) {
            let mut raw = String::new();
            entry.read_to_string(&mut raw)?;
            documents = Some(snapshot::decode_full(SNAPSHOT_ENTRY, &raw)?);
        } else if let Some(id) = file_owner(&entry_path) {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            files.insert(id, bytes);
        } else {
            tracing::debug!(entry = %entry_path.display(), "ignoring archive entry");
        }
    }

    let documents = documents.ok_or_else(|| {
        PortalError::InvalidUpload(format!(
            "{} is not a portal export (no {})",
            path.display(),
            SNAPSHOT_ENTRY
        ))
    })?;
    Ok(Contents { documents, files })
}

/// Replaces every upload with the archive's content. Ids are preserved.
pub async fn run(registry: &DocumentRegistry, archive: &Path) -> Result<CmdResult> {
    let Contents {
        mut documents,
        files,
    } = read_archive(archive)?;

    let mut without_content = 0;
    for doc in documents.iter_mut() {
        if let Some(bytes) = files.get(&doc.id) {
            doc.encoded_blob = Some(codec::encode(bytes, &doc.mime_type));
            doc.file_size_bytes = bytes.len() as u64;
        } else if !doc.has_blob() {
            without_content += 1;
        }
    }

    let summaries: Vec<EntrySummary> = documents.iter().map(EntrySummary::from).collect();
    let count = registry.replace_all(documents).await;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Imported {} upload(s) from {}",
        count,
        archive.display()
    )));
    if without_content > 0 {
        result.add_message(CmdMessage::warning(format!(
            "{} upload(s) were imported without content.",
            without_content
        )));
    }
    Ok(result.with_affected(summaries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::export;
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};

    #[tokio::test]
    async fn export_then_import_restores_uploads() {
        let source = env();
        let bytes: Vec<u8> = (0..200u8).collect();
        let original = source
            .registry
            .add(NewUpload {
                title: "Plano".into(),
                chapter_code: "05".into(),
                tags: vec!["cad".into()],
                file_name: "plano.dwg".into(),
                file_size_bytes: bytes.len() as u64,
                mime_type: "application/octet-stream".into(),
                status: Status::Draft,
                encoded_blob: codec::encode(&bytes, "application/octet-stream"),
            })
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup.tar.gz");
        export::run(&source.registry, &archive).unwrap();

        let target = env();
        let result = run(&target.registry, &archive).await.unwrap();
        assert_eq!(result.affected.len(), 1);

        let imported = target.registry.get(&original.id).unwrap();
        assert_eq!(imported.title, "Plano");
        assert_eq!(imported.status, Status::Draft);
        assert_eq!(imported.tags, vec!["cad"]);
        let blob = imported.encoded_blob.unwrap();
        assert_eq!(codec::decode(&blob, &imported.mime_type).unwrap(), bytes);

        target.registry.settle().await;
        source.registry.settle().await;
        assert!(target.large.raw("uploadedDocuments").is_some());
    }

    #[test]
    fn file_owner_requires_exact_layout() {
        assert_eq!(
            file_owner(Path::new("files/upload_1/a.pdf")),
            Some("upload_1".to_string())
        );
        assert_eq!(file_owner(Path::new("files/upload_1")), None);
        assert_eq!(file_owner(Path::new("other/upload_1/a.pdf")), None);
        assert_eq!(file_owner(Path::new("files/upload_1/x/a.pdf")), None);
    }

    #[tokio::test]
    async fn archive_without_snapshot_is_rejected() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tar.gz");
        {
            let enc = flate2::write::GzEncoder::new(
                File::create(&path).unwrap(),
                flate2::Compression::default(),
            );
            let mut tar = tar::Builder::new(enc);
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, "readme.txt", &b"hi"[..]).unwrap();
            tar.into_inner().unwrap().finish().unwrap();
        }
        let err = run(&env.registry, &path).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidUpload(_)));
    }
}
