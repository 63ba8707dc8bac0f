//! Tag support for uploads.
//!
//! Tags arrive as one comma-separated string typed by the user. [`parse_tags`]
//! turns that into the list stored on the document:
//!
//! - each piece is trimmed, empty pieces are dropped
//! - duplicates are removed case-insensitively, the first spelling wins
//! - every remaining tag must pass [`validate_tag`]
//!
//! Manifest documents carry their tags as given by the manifest; no
//! normalization is applied to them.

pub mod validation;

pub use validation::{validate_tag, TagValidationError, MAX_TAG_LEN};

/// Parses comma-separated tag input.
///
/// # Examples
/// ```
/// use portalapp::tags::parse_tags;
///
/// let tags = parse_tags(" Calidad, ensayo,,calidad ").unwrap();
/// assert_eq!(tags, vec!["Calidad", "ensayo"]);
/// ```
pub fn parse_tags(input: &str) -> Result<Vec<String>, TagValidationError> {
    let mut tags: Vec<String> = Vec::new();
    for piece in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        validate_tag(piece)?;
        if !contains_tag(&tags, piece) {
            tags.push(piece.to_string());
        }
    }
    Ok(tags)
}

/// Normalizes an already split list the same way [`parse_tags`] does.
pub fn normalize_tags<I, S>(tags: I) -> Result<Vec<String>, TagValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        validate_tag(tag)?;
        if !contains_tag(&out, tag) {
            out.push(tag.to_string());
        }
    }
    Ok(out)
}

/// Case-insensitive membership test.
pub fn contains_tag(tags: &[String], tag: &str) -> bool {
    let needle = tag.to_lowercase();
    tags.iter().any(|t| t.to_lowercase() == needle)
}
