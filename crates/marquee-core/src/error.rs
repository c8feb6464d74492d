//! Error types for Marquee Core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    // Player errors
    #[error("Player is not attached")]
    PlayerNotReady,

    #[error("Invalid seek position: {position}s")]
    InvalidSeek { position: f64 },

    // Renewal errors
    #[error("No DRM configuration for content: {content_key}")]
    NoDrmConfig { content_key: String },

    #[error("Renewal store error: {0}")]
    Store(String),

    // Catalog errors
    #[error("Failed to fetch catalog: {0}")]
    CatalogFetch(String),

    #[error("Failed to parse catalog: {0}")]
    CatalogParse(String),

    #[error("Unknown content: {0}")]
    UnknownContent(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Returns true if a later retry of the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PlayerNotReady | Error::CatalogFetch(_) | Error::Store(_) | Error::Io(_)
        )
    }

    /// Returns the stable error code used in logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlayerNotReady => "PLAYER_NOT_READY",
            Error::InvalidSeek { .. } => "INVALID_SEEK",
            Error::NoDrmConfig { .. } => "NO_DRM_CONFIG",
            Error::Store(_) => "STORE",
            Error::CatalogFetch(_) => "CATALOG_FETCH",
            Error::CatalogParse(_) => "CATALOG_PARSE",
            Error::UnknownContent(_) => "UNKNOWN_CONTENT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::PlayerNotReady.error_code(), "PLAYER_NOT_READY");
        assert_eq!(Error::store("disk full").error_code(), "STORE");
        assert_eq!(
            Error::NoDrmConfig { content_key: "a".into() }.to_string(),
            "No DRM configuration for content: a"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::PlayerNotReady.is_recoverable());
        assert!(!Error::InvalidConfig("zero interval".into()).is_recoverable());
    }
}
