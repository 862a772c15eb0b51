//! Error types for talos-image

use thiserror::Error;

/// Result type alias using talos-image's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Image and registry error types
#[derive(Error, Debug)]
pub enum Error {
    /// Text is not a valid image reference
    #[error("Invalid image reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Registry answered with an error or an unusable response
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cache store failure
    #[error(transparent)]
    Store(#[from] talos_core::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a registry error
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }
}
