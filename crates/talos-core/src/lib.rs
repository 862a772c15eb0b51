//! # talos-core
//!
//! Core library for Talos providing:
//! - Per-location update settings and the compact annotation grammar
//! - Configuration file parsing (talos.yaml) with environment overrides
//! - The persistent store abstraction, its versioned key schema, and
//!   in-memory and file-backed implementations

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::LoadedConfig;
pub use error::{Error, Result};
pub use store::{FileStore, MemoryStore, Store};
pub use types::{BumpSize, BumpStrategy, TalosConfig, TalosSettings};
