//! # Blob Codec
//!
//! Converts uploaded bytes to a text form that can live inside a JSON snapshot, and back.
//!
//! Two encodings exist and the choice is made from the MIME type:
//!
//! - **Data URL** (`data:<mime>;base64,<payload>`) for everything binary: PDFs, images,
//!   office files, archives.
//! - **Raw UTF-8 text** for HTML uploads, so that markup (and its accented characters)
//!   survives without a base64 hop. HTML that is not valid UTF-8 falls back to a data URL.
//!
//! [`decode`] inverts [`encode`] exactly: a `data:...;base64,` prefix is always honoured,
//! raw text is returned as its UTF-8 bytes.
//!
//! The codec itself has no size policy; callers reject oversized files first.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{PortalError, Result};

/// Encoded form of an uploaded file, as stored in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedBlob(String);

impl EncodedBlob {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_data_url(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn is_html_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}

/// HTML is kept as text unless it is not UTF-8 or would read back as a data URL.
pub fn encode(bytes: &[u8], mime: &str) -> EncodedBlob {
    if is_html_mime(mime) {
        match std::str::from_utf8(bytes) {
            Ok(text) if !text.starts_with("data:") => return EncodedBlob(text.to_string()),
            _ => {}
        }
    }
    let essence = mime.split(';').next().unwrap_or("").trim();
    let essence = if essence.is_empty() {
        "application/octet-stream"
    } else {
        essence
    };
    EncodedBlob(format!("data:{};base64,{}", essence, STANDARD.encode(bytes)))
}

pub fn decode(blob: &EncodedBlob, mime: &str) -> Result<Vec<u8>> {
    let raw = blob.as_str();
    if let Some(rest) = raw.strip_prefix("data:") {
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            PortalError::UnsupportedEncoding("data URL without payload separator".to_string())
        })?;
        if header.ends_with(";base64") {
            return STANDARD
                .decode(payload.trim())
                .map_err(|e| PortalError::UnsupportedEncoding(format!("bad base64: {}", e)));
        }
        return Ok(payload.as_bytes().to_vec());
    }
    if !is_html_mime(mime) {
        tracing::debug!(mime, "decoding raw blob as opaque bytes");
    }
    Ok(raw.as_bytes().to_vec())
}

/// MIME type by file extension, `application/octet-stream` when unknown.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "txt" | "ini" | "cfg" | "conf" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        _ => "application/octet-stream",
    }
}

/// Reads a file, failing with `ReadTimeout` past the budget and
/// `UnsupportedEncoding` on any I/O failure.
pub async fn read_file(path: &Path, timeout: Duration) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, tokio::fs::read(path)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(PortalError::UnsupportedEncoding(format!(
            "{}: {}",
            path.display(),
            e
        ))),
        Err(_) => Err(PortalError::ReadTimeout {
            path: path.display().to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Reads and encodes a file in one step.
pub async fn encode_file(path: &Path, mime: &str, timeout: Duration) -> Result<EncodedBlob> {
    let bytes = read_file(path, timeout).await?;
    Ok(encode(&bytes, mime))
}
