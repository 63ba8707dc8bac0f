//! Tag validation for portal uploads.
//!
//! Tags are free-form labels. A valid tag:
//! - Is not empty after trimming
//! - Has at most [`MAX_TAG_LEN`] characters
//! - Contains no control characters
//! - Contains no commas (commas separate tags on input)

pub const MAX_TAG_LEN: usize = 64;

/// Validates a single, already trimmed tag.
///
/// # Examples
/// ```
/// use portalapp::tags::validation::validate_tag;
///
/// assert!(validate_tag("calidad").is_ok());
/// assert!(validate_tag("ISO 9001").is_ok());
///
/// assert!(validate_tag("").is_err());
/// assert!(validate_tag("a,b").is_err());
/// assert!(validate_tag("tab\there").is_err());
/// ```
pub fn validate_tag(tag: &str) -> Result<(), TagValidationError> {
    if tag.is_empty() {
        return Err(TagValidationError::Empty);
    }

    let len = tag.chars().count();
    if len > MAX_TAG_LEN {
        return Err(TagValidationError::TooLong(len));
    }

    for ch in tag.chars() {
        if ch.is_control() {
            return Err(TagValidationError::ControlCharacter);
        }
        if ch == ',' {
            return Err(TagValidationError::Comma);
        }
    }

    Ok(())
}

/// Error type for tag validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValidationError {
    /// Tag is empty
    Empty,
    /// Tag is longer than [`MAX_TAG_LEN`] characters
    TooLong(usize),
    /// Tag contains a control character
    ControlCharacter,
    /// Tag contains a comma
    Comma,
}

impl std::fmt::Display for TagValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValidationError::Empty => write!(f, "Tag cannot be empty"),
            TagValidationError::TooLong(len) => write!(
                f,
                "Tag is {} characters long (at most {} allowed)",
                len, MAX_TAG_LEN
            ),
            TagValidationError::ControlCharacter => {
                write!(f, "Tag cannot contain control characters")
            }
            TagValidationError::Comma => write!(f, "Tag cannot contain a comma"),
        }
    }
}

impl std::error::Error for TagValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags() {
        assert!(validate_tag("a").is_ok());
        assert!(validate_tag("procedimiento").is_ok());
        assert!(validate_tag("ISO 9001:2015").is_ok());
        assert!(validate_tag("año-2024").is_ok());
        assert!(validate_tag(&"x".repeat(MAX_TAG_LEN)).is_ok());
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate_tag(""), Err(TagValidationError::Empty));
    }

    #[test]
    fn test_too_long() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        assert_eq!(
            validate_tag(&long),
            Err(TagValidationError::TooLong(MAX_TAG_LEN + 1))
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_TAG_LEN);
        assert!(validate_tag(&accented).is_ok());
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(
            validate_tag("new\nline"),
            Err(TagValidationError::ControlCharacter)
        );
        assert_eq!(
            validate_tag("bell\u{7}"),
            Err(TagValidationError::ControlCharacter)
        );
    }

    #[test]
    fn test_comma() {
        assert_eq!(validate_tag("a,b"), Err(TagValidationError::Comma));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TagValidationError::Empty.to_string(),
            "Tag cannot be empty"
        );
        assert!(TagValidationError::TooLong(70).to_string().contains("70"));
    }
}
