//! Error types for talos-git

use thiserror::Error;

/// Result type alias using talos-git's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Git and git host error types
#[derive(Error, Debug)]
pub enum Error {
    /// Git operation failed
    #[error("Git operation failed: {message}")]
    GitOperation { message: String },

    /// Git command not found
    #[error("Git command not found. Please ensure git is installed and in PATH")]
    GitNotFound,

    /// The remote rejected a push that does not fast-forward
    #[error("Push to {branch} rejected as non-fast-forward: {message}")]
    NonFastForward { branch: String, message: String },

    /// Git host API returned an error
    #[error("Git host error ({status}): {message}")]
    Host { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid repository URL
    #[error("Invalid repository URL: {url}")]
    InvalidRepoUrl { url: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a git operation error
    pub fn git_operation(message: impl Into<String>) -> Self {
        Self::GitOperation {
            message: message.into(),
        }
    }

    /// Create a non-fast-forward error
    pub fn non_fast_forward(branch: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NonFastForward {
            branch: branch.into(),
            message: message.into(),
        }
    }

    /// Create a git host error
    pub fn host(status: u16, message: impl Into<String>) -> Self {
        Self::Host {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid repository URL error
    pub fn invalid_repo_url(url: impl Into<String>) -> Self {
        Self::InvalidRepoUrl { url: url.into() }
    }
}
