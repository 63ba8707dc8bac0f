use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Could not encode file: {0}")]
    UnsupportedEncoding(String),

    #[error("Reading {path} took longer than {secs}s")]
    ReadTimeout { path: String, secs: u64 },

    #[error("{backend} storage is full: needed {needed} bytes, {available} available")]
    QuotaExceeded {
        backend: String,
        needed: u64,
        available: u64,
    },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Manifest could not be loaded: {0}")]
    ManifestLoadFailure(String),

    #[error("Corrupt snapshot under '{key}': {reason}")]
    CorruptSnapshot { key: String, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Feature disabled: {0}")]
    FeatureDisabled(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Api Error: {0}")]
    Api(String),
}

impl PortalError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortalError::Unavailable(_) | PortalError::Io(_) | PortalError::ReadTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
