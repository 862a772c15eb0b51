//! Error types for talos-orchestrator

use thiserror::Error;

/// Result type alias using talos-orchestrator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestration error types
#[derive(Error, Debug)]
pub enum Error {
    /// A repository names a host missing from the configuration
    #[error("Repository '{repository}' uses unknown host '{host}'")]
    UnknownHost { repository: String, host: String },

    /// The interaction sink failed
    #[error("Interaction sink error: {message}")]
    Sink { message: String },

    #[error(transparent)]
    Core(#[from] talos_core::Error),

    #[error(transparent)]
    Image(#[from] talos_image::Error),

    #[error(transparent)]
    Location(#[from] talos_locations::Error),

    #[error(transparent)]
    Queue(#[from] talos_queue::Error),

    #[error(transparent)]
    Git(#[from] talos_git::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an unknown host error
    pub fn unknown_host(repository: impl Into<String>, host: impl Into<String>) -> Self {
        Self::UnknownHost {
            repository: repository.into(),
            host: host.into(),
        }
    }

    /// Create an interaction sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }
}
