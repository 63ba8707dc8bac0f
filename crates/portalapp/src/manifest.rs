//! # Manifest
//!
//! The static chapter/document taxonomy, loaded once per session and never
//! written back.
//!
//! ## Accepted Shapes
//!
//! ```text
//! [ {chapter}, ... ]                       top-level array
//! { "chapters":  [ {chapter}, ... ] }
//! { "secciones": [ {chapter}, ... ] }      older Spanish manifests
//! ```
//!
//! Chapters recurse through `subchapters` (or `subcapitulos`). Field aliases are
//! handled on the model types in [`crate::model`].
//!
//! ## Identity
//!
//! Manifest documents have no id. Catalog entries use
//! `manifest_<chapter code>/<title>`, which only works while titles are unique
//! inside a chapter. [`Manifest::title_collisions`]
//! lists every violation so manifest authors can fix them; the catalog
//! disambiguates repeats with a `#<n>` suffix in the meantime.
//!
//! Any failure to read or parse the manifest is a
//! [`PortalError::ManifestLoadFailure`]: without it there is no chapter
//! structure, so it is fatal to the session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{PortalError, Result};
use crate::model::ManifestChapter;

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Bare(Vec<ManifestChapter>),
    Wrapped {
        #[serde(alias = "secciones")]
        chapters: Vec<ManifestChapter>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    chapters: Vec<ManifestChapter>,
}

/// Two or more documents sharing a title inside one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleCollision {
    pub chapter_code: String,
    pub title: String,
    pub occurrences: usize,
}

impl Manifest {
    pub fn new(chapters: Vec<ManifestChapter>) -> Self {
        Self { chapters }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: ManifestFile = serde_json::from_str(raw)
            .map_err(|e| PortalError::ManifestLoadFailure(format!("invalid manifest: {}", e)))?;
        let chapters = match file {
            ManifestFile::Bare(chapters) => chapters,
            ManifestFile::Wrapped { chapters } => chapters,
        };
        Ok(Self { chapters })
    }

    pub fn chapters(&self) -> &[ManifestChapter] {
        &self.chapters
    }

    /// Every chapter and subchapter, depth first, with its nesting depth.
    pub fn walk(&self) -> Vec<(usize, &ManifestChapter)> {
        fn visit<'a>(
            chapters: &'a [ManifestChapter],
            depth: usize,
            out: &mut Vec<(usize, &'a ManifestChapter)>,
        ) {
            for chapter in chapters {
                out.push((depth, chapter));
                visit(&chapter.subchapters, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        visit(&self.chapters, 0, &mut out);
        out
    }

    /// Looks up a chapter or subchapter by code.
    pub fn find_chapter(&self, code: &str) -> Option<&ManifestChapter> {
        self.walk()
            .into_iter()
            .map(|(_, chapter)| chapter)
            .find(|chapter| chapter.code == code)
    }

    pub fn has_chapter(&self, code: &str) -> bool {
        self.find_chapter(code).is_some()
    }

    /// Documents in the whole manifest, separators excluded.
    pub fn document_count(&self) -> usize {
        self.walk()
            .iter()
            .map(|(_, chapter)| chapter.documents().count())
            .sum()
    }

    pub fn title_collisions(&self) -> Vec<TitleCollision> {
        let mut collisions = Vec::new();
        for (_, chapter) in self.walk() {
            let mut seen: Vec<(&str, usize)> = Vec::new();
            for doc in chapter.documents() {
                match seen.iter_mut().find(|(title, _)| *title == doc.title) {
                    Some((_, count)) => *count += 1,
                    None => seen.push((doc.title.as_str(), 1)),
                }
            }
            collisions.extend(seen.into_iter().filter(|(_, n)| *n > 1).map(|(title, n)| {
                TitleCollision {
                    chapter_code: chapter.code.clone(),
                    title: title.to_string(),
                    occurrences: n,
                }
            }));
        }
        collisions
    }

    /// Chapter code to title, for every chapter and subchapter.
    pub fn chapter_titles(&self) -> HashMap<&str, &str> {
        self.walk()
            .into_iter()
            .map(|(_, c)| (c.code.as_str(), c.title.as_str()))
            .collect()
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Loads the manifest from a file path or an `http(s)://` URL.
#[instrument(level = "info", skip(timeout))]
pub async fn load(location: &str, timeout: Duration) -> Result<Manifest> {
    let raw = if is_url(location) {
        fetch(location, timeout).await?
    } else {
        tokio::fs::read_to_string(Path::new(location))
            .await
            .map_err(|e| PortalError::ManifestLoadFailure(format!("{}: {}", location, e)))?
    };
    let manifest = Manifest::parse(&raw)?;
    for collision in manifest.title_collisions() {
        tracing::warn!(
            chapter = %collision.chapter_code,
            title = %collision.title,
            occurrences = collision.occurrences,
            "duplicate document title in chapter"
        );
    }
    tracing::info!(
        chapters = manifest.chapters.len(),
        documents = manifest.document_count(),
        "manifest loaded"
    );
    Ok(manifest)
}

async fn fetch(url: &str, timeout: Duration) -> Result<String> {
    let failure = |e: reqwest::Error| PortalError::ManifestLoadFailure(format!("{}: {}", url, e));
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(failure)?;
    let response = client.get(url).send().await.map_err(failure)?;
    let status = response.status();
    if !status.is_success() {
        return Err(PortalError::ManifestLoadFailure(format!(
            "{} returned {}",
            url, status
        )));
    }
    response.text().await.map_err(failure)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "secciones": [
            {
                "codigo": "01",
                "titulo": "Sistema de Gestión",
                "items": [
                    {"nombre": "Manual de Calidad", "ruta": "docs/01/manual.pdf", "estado": "Aprobado"},
                    {"nombre": "---", "tipo": "separador"},
                    {"nombre": "Política", "ruta": "docs/01/politica.pdf"}
                ],
                "subcapitulos": [
                    {
                        "codigo": "01.1",
                        "titulo": "Procedimientos",
                        "items": [
                            {"nombre": "Control", "ruta": "a.pdf"},
                            {"nombre": "Control", "ruta": "b.pdf"}
                        ]
                    }
                ]
            },
            {"codigo": "05", "titulo": "Ensayos"}
        ]
    }"#;

    #[test]
    fn parses_spanish_wrapped_manifest() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.chapters().len(), 2);
        let first = &manifest.chapters()[0];
        assert_eq!(first.code, "01");
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.documents().count(), 2);
        assert_eq!(first.subchapters[0].code, "01.1");
    }

    #[test]
    fn parses_bare_and_english_shapes() {
        let bare = r#"[{"code":"02","title":"Docs","items":[{"title":"A","path":"a.pdf"}]}]"#;
        assert_eq!(Manifest::parse(bare).unwrap().document_count(), 1);
        let wrapped = r#"{"chapters":[{"code":"02","title":"Docs"}]}"#;
        assert!(Manifest::parse(wrapped).unwrap().has_chapter("02"));
    }

    #[test]
    fn invalid_manifest_is_load_failure() {
        assert!(matches!(
            Manifest::parse("{\"nothing\": true}"),
            Err(PortalError::ManifestLoadFailure(_))
        ));
        assert!(matches!(
            Manifest::parse("not json"),
            Err(PortalError::ManifestLoadFailure(_))
        ));
    }

    #[test]
    fn finds_nested_chapters() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.find_chapter("01.1").unwrap().title, "Procedimientos");
        assert!(manifest.find_chapter("99").is_none());
        assert_eq!(manifest.document_count(), 4);
        let depths: Vec<usize> = manifest.walk().iter().map(|(d, _)| *d).collect();
        assert_eq!(depths, vec![0, 1, 0]);
    }

    #[test]
    fn reports_title_collisions() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(
            manifest.title_collisions(),
            vec![TitleCollision {
                chapter_code: "01.1".into(),
                title: "Control".into(),
                occurrences: 2,
            }]
        );
    }

    #[tokio::test]
    async fn load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let manifest = load(path.to_str().unwrap(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(manifest.has_chapter("05"));

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load(missing.to_str().unwrap(), Duration::from_secs(5)).await,
            Err(PortalError::ManifestLoadFailure(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_url_is_load_failure() {
        let err = load("http://127.0.0.1:9/manifest.json", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::ManifestLoadFailure(_)));
    }
}
