//! Error types for talos-queue

use std::time::Duration;
use thiserror::Error;

/// Result type alias using talos-queue's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Queue error types
#[derive(Error, Debug)]
pub enum Error {
    /// Another consumer held the queue lock for the whole wait
    #[error("Timed out after {waited:?} waiting for the queue lock")]
    LockTimeout { waited: Duration },

    /// Persistent store failure
    #[error(transparent)]
    Store(#[from] talos_core::Error),

    /// A stored entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a lock timeout error
    pub fn lock_timeout(waited: Duration) -> Self {
        Self::LockTimeout { waited }
    }
}
