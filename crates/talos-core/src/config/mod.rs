//! Configuration loading

mod loader;

pub use loader::{LoadedConfig, CONFIG_FILE_NAMES};
