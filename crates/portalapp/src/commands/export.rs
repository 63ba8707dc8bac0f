//! Archive export.
//!
//! ```text
//! snapshot.json              full snapshot, blobs stripped
//! files/<id>/<file name>     decoded content of each upload
//! ```

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::commands::view::safe_file_name;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{PortalError, Result};
use crate::model::UploadedDocument;
use crate::registry::DocumentRegistry;
use crate::snapshot;

pub const SNAPSHOT_ENTRY: &str = "snapshot.json";
pub const FILES_DIR: &str = "files";

/// Exports every upload to `dest`: a `.tar.gz` path, or a directory that gets a
/// timestamped archive.
pub fn run(registry: &DocumentRegistry, dest: &Path) -> Result<CmdResult> {
    let documents = registry.all();
    let mut result = CmdResult::default();
    if documents.is_empty() {
        result.add_message(CmdMessage::info("No uploads to export."));
        return Ok(result);
    }

    let path = if dest.is_dir() {
        let name = format!("portal-{}.tar.gz", Utc::now().format("%Y-%m-%d_%H-%M-%S"));
        dest.join(name)
    } else {
        dest.to_path_buf()
    };
    let file = File::create(&path)?;
    let missing = write_archive(file, &documents)?;

    result.add_message(CmdMessage::success(format!(
        "Exported {} upload(s) to {}",
        documents.len(),
        path.display()
    )));
    if missing > 0 {
        result.add_message(CmdMessage::warning(format!(
            "{} upload(s) had no content available and were exported without a file.",
            missing
        )));
    }
    Ok(result.with_paths(vec![path]))
}

pub(crate) fn file_entry_name(doc: &UploadedDocument) -> PathBuf {
    let name = if doc.file_name.is_empty() {
        doc.id.clone()
    } else {
        safe_file_name(&doc.file_name)
    };
    Path::new(FILES_DIR).join(safe_file_name(&doc.id)).join(name)
}

fn append<W: Write>(tar: &mut tar::Builder<W>, name: &Path, bytes: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);
    header.set_cksum();
    tar.append_data(&mut header, name, bytes)
        .map_err(PortalError::Io)
}

/// Writes the archive. Returns how many uploads had no blob to write.
fn write_archive<W: Write>(writer: W, documents: &[UploadedDocument]) -> Result<usize> {
    let enc = GzEncoder::new(writer, Compression::default());
    let mut tar = tar::Builder::new(enc);

    let stripped: Vec<UploadedDocument> = documents
        .iter()
        .map(|d| UploadedDocument {
            encoded_blob: None,
            ..d.clone()
        })
        .collect();
    let snapshot = snapshot::encode_full(&stripped)?;
    append(&mut tar, Path::new(SNAPSHOT_ENTRY), snapshot.as_bytes())?;

    let mut missing = 0;
    for doc in documents {
        match &doc.encoded_blob {
            Some(blob) => {
                let bytes = codec::decode(blob, &doc.mime_type)?;
                append(&mut tar, &file_entry_name(doc), &bytes)?;
            }
            None => missing += 1,
        }
    }

    tar.into_inner()
        .map_err(PortalError::Io)?
        .finish()
        .map_err(PortalError::Io)?;
    Ok(missing)
}
