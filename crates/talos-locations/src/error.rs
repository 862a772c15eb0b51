//! Error types for talos-locations

use camino::Utf8PathBuf;
use thiserror::Error;

/// Result type alias using talos-locations' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Location error types
#[derive(Error, Debug)]
pub enum Error {
    /// The file no longer holds what the location recorded at scan time
    #[error("Concurrent modification of {path}: {message}")]
    ConcurrencyConflict { path: Utf8PathBuf, message: String },

    /// The location cannot be found or edited safely
    #[error("Invalid location in {path}: {message}")]
    InvalidLocation { path: Utf8PathBuf, message: String },

    /// Glob pattern error
    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    /// Directory walk error
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Registry or reference error
    #[error(transparent)]
    Image(#[from] talos_image::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a concurrency conflict error
    pub fn conflict(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid location error
    pub fn invalid_location(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidLocation {
            path: path.into(),
            message: message.into(),
        }
    }
}
