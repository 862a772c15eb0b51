//! Error types for talos-core

use thiserror::Error;

/// Result type alias using talos-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Talos
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid update settings annotation
    #[error("Invalid settings '{input}': {reason}")]
    InvalidSettings { input: String, reason: String },

    /// Persistent store failure
    #[error("Store error: {message}")]
    Store { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid settings error
    pub fn invalid_settings(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
