use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, Origin};
use crate::codec;
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::error::{PortalError, Result};
use crate::manifest::Manifest;
use crate::model::UploadedDocument;
use crate::registry::DocumentRegistry;

/// Replaces path separators and control characters so a stored file name
/// cannot escape the target directory.
pub(crate) fn safe_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

fn target_path(doc: &UploadedDocument, dest: &Path) -> PathBuf {
    if dest.is_dir() {
        let name = if doc.file_name.is_empty() {
            doc.id.clone()
        } else {
            doc.file_name.clone()
        };
        dest.join(safe_file_name(&name))
    } else {
        dest.to_path_buf()
    }
}

/// Writes an upload's content to `dest` (a directory or a file path). Manifest
/// entries are reported with their locator; their files are not part of storage.
pub fn run(
    manifest: &Manifest,
    registry: &DocumentRegistry,
    id: &str,
    dest: &Path,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();

    let upload = registry.with_documents(|uploads| {
        let catalog = Catalog::new(manifest, uploads);
        let entry = catalog
            .find(id)
            .ok_or_else(|| PortalError::NotFound(id.to_string()))?;
        result.listed.push(EntrySummary::from(&entry));
        Ok::<_, PortalError>(match entry.origin {
            Origin::Upload(doc) => Some(doc.clone()),
            Origin::Manifest(doc) => {
                result.add_message(CmdMessage::info(format!(
                    "\"{}\" is published at {}",
                    doc.title, doc.path
                )));
                None
            }
        })
    })?;

    let Some(doc) = upload else {
        return Ok(result);
    };
    let Some(blob) = doc.encoded_blob.as_ref() else {
        result.add_message(CmdMessage::warning(format!(
            "The content of \"{}\" is not available yet.",
            doc.title
        )));
        return Ok(result);
    };

    let bytes = codec::decode(blob, &doc.mime_type)?;
    let path = target_path(&doc, dest);
    std::fs::write(&path, &bytes)?;
    result.add_message(CmdMessage::success(format!(
        "Saved \"{}\" to {}",
        doc.title,
        path.display()
    )));
    Ok(result.with_paths(vec![path]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::env;
    use crate::model::{NewUpload, Status};

    #[tokio::test]
    async fn writes_upload_into_directory() {
        let env = env();
        let bytes: Vec<u8> = (0..=255u8).collect();
        let doc = env
            .registry
            .add(NewUpload {
                title: "Binario".into(),
                chapter_code: "05".into(),
                tags: Vec::new(),
                file_name: "../datos.bin".into(),
                file_size_bytes: bytes.len() as u64,
                mime_type: "application/octet-stream".into(),
                status: Status::Approved,
                encoded_blob: codec::encode(&bytes, "application/octet-stream"),
            })
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = run(&env.manifest, &env.registry, &doc.id, dir.path()).unwrap();

        assert_eq!(result.paths.len(), 1);
        assert!(result.paths[0].starts_with(dir.path()));
        assert_eq!(std::fs::read(&result.paths[0]).unwrap(), bytes);
        env.registry.settle().await;
    }

    #[test]
    fn manifest_entry_reports_locator() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            &env.manifest,
            &env.registry,
            "manifest_01/Manual de Calidad",
            dir.path(),
        )
        .unwrap();
        assert!(result.paths.is_empty());
        assert!(result.messages[0].content.contains("docs/01/manual.pdf"));
    }

    #[test]
    fn blobless_upload_warns() {
        let env = env();
        let mut doc = crate::model::UploadedDocument::from_meta(&crate::model::DocumentMeta {
            id: "upload_1".into(),
            title: "Pendiente".into(),
            date: chrono::Utc::now(),
            chapter_code: "05".into(),
            tags: Vec::new(),
            file_name: Some("p.pdf".into()),
            file_size_bytes: None,
            mime_type: None,
            status: None,
        });
        doc.encoded_blob = None;
        env.registry.restore(vec![doc]);
        let dir = tempfile::tempdir().unwrap();

        let result = run(&env.manifest, &env.registry, "upload_1", dir.path()).unwrap();
        assert!(result.paths.is_empty());
        assert!(result.messages[0].content.contains("not available yet"));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run(&env.manifest, &env.registry, "upload_x", dir.path()),
            Err(PortalError::NotFound(_))
        ));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(safe_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(safe_file_name("informe.pdf"), "informe.pdf");
        assert_eq!(safe_file_name(".."), "document");
    }
}
