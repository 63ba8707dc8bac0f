use std::path::{Path, PathBuf};

use crate::codec;
use crate::commands::{CmdMessage, CmdResult, EntrySummary};
use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::manifest::Manifest;
use crate::model::{format_file_size, NewUpload, Status};
use crate::registry::DocumentRegistry;
use crate::tags::parse_tags;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub title: String,
    pub chapter_code: String,
    /// Comma-separated, as typed.
    pub tags: String,
    pub status: Status,
}

impl UploadRequest {
    pub fn new(
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        chapter_code: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            chapter_code: chapter_code.into(),
            tags: String::new(),
            status: Status::Approved,
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PortalError::InvalidUpload(format!("{} is not a file", path.display())))
}

fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Everything checked before the file is read. Returns the file name and size.
fn validate(
    manifest: &Manifest,
    config: &PortalConfig,
    request: &UploadRequest,
) -> Result<(String, u64)> {
    if request.title.trim().is_empty() {
        return Err(PortalError::InvalidUpload("title is required".into()));
    }
    if !manifest.has_chapter(&request.chapter_code) {
        return Err(PortalError::InvalidUpload(format!(
            "unknown chapter '{}'",
            request.chapter_code
        )));
    }

    let name = file_name(&request.path)?;
    match extension(&name) {
        Some(ext) if config.is_extension_allowed(ext) => {}
        Some(ext) => {
            return Err(PortalError::InvalidUpload(format!(
                "files of type .{} are not accepted",
                ext
            )))
        }
        None => {
            return Err(PortalError::InvalidUpload(format!(
                "{} has no file extension",
                name
            )))
        }
    }

    let meta = std::fs::metadata(&request.path).map_err(|e| {
        PortalError::InvalidUpload(format!("{}: {}", request.path.display(), e))
    })?;
    if !meta.is_file() {
        return Err(PortalError::InvalidUpload(format!(
            "{} is not a file",
            request.path.display()
        )));
    }
    if meta.len() > config.max_upload_bytes {
        return Err(PortalError::InvalidUpload(format!(
            "{} is {}, the limit is {}",
            name,
            format_file_size(meta.len()),
            format_file_size(config.max_upload_bytes)
        )));
    }
    Ok((name, meta.len()))
}

pub async fn run(
    registry: &DocumentRegistry,
    manifest: &Manifest,
    config: &PortalConfig,
    request: UploadRequest,
) -> Result<CmdResult> {
    let (name, size) = validate(manifest, config, &request)?;
    let tags = parse_tags(&request.tags).map_err(|e| PortalError::InvalidUpload(e.to_string()))?;

    let mime = codec::mime_for_path(&request.path);
    let blob = codec::encode_file(&request.path, mime, config.read_timeout()).await?;

    let doc = registry
        .add(NewUpload {
            title: request.title.trim().to_string(),
            chapter_code: request.chapter_code,
            tags,
            file_name: name,
            file_size_bytes: size,
            mime_type: mime.to_string(),
            status: request.status,
            encoded_blob: blob,
        })
        .await?;

    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Uploaded \"{}\" to chapter {} ({})",
        doc.title,
        doc.chapter_code,
        format_file_size(doc.file_size_bytes)
    )));
    Ok(result.with_affected(vec![EntrySummary::from(&doc)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::env;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn uploads_valid_file() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "report.pdf", b"%PDF-1.4 test");
        let request = UploadRequest::new(&path, "  Test Report ", "05").with_tags("ensayo, Ensayo, lab");

        let result = run(&env.registry, &env.manifest, &PortalConfig::default(), request)
            .await
            .unwrap();

        assert_eq!(result.affected.len(), 1);
        let doc = env.registry.all().pop().unwrap();
        assert_eq!(doc.title, "Test Report");
        assert_eq!(doc.chapter_code, "05");
        assert_eq!(doc.tags, vec!["ensayo", "lab"]);
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.file_size_bytes, 13);
        let blob = doc.encoded_blob.unwrap();
        assert_eq!(codec::decode(&blob, "application/pdf").unwrap(), b"%PDF-1.4 test");
        env.registry.settle().await;
    }

    #[tokio::test]
    async fn rejects_empty_title_and_unknown_chapter() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.pdf", b"x");
        let config = PortalConfig::default();

        let err = run(&env.registry, &env.manifest, &config, UploadRequest::new(&path, " ", "05"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidUpload(_)));

        let err = run(&env.registry, &env.manifest, &config, UploadRequest::new(&path, "A", "99"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown chapter"));
        assert!(env.registry.is_empty());
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "setup.exe", b"MZ");
        let err = run(
            &env.registry,
            &env.manifest,
            &PortalConfig::default(),
            UploadRequest::new(&path, "Setup", "05"),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains(".exe"));
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "big.txt", &[b'a'; 64]);
        let config = PortalConfig {
            max_upload_bytes: 10,
            ..Default::default()
        };
        let err = run(&env.registry, &env.manifest, &config, UploadRequest::new(&path, "Big", "05"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidUpload(_)));
        assert!(env.registry.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_invalid_upload() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &env.registry,
            &env.manifest,
            &PortalConfig::default(),
            UploadRequest::new(dir.path().join("nope.pdf"), "Nope", "05"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PortalError::InvalidUpload(_)));
    }

    #[test]
    fn extension_parsing() {
        assert_eq!(extension("a.PDF"), Some("PDF"));
        assert_eq!(extension("archive.tar.gz"), Some("gz"));
        assert_eq!(extension(".bashrc"), None);
        assert_eq!(extension("README"), None);
    }
}
