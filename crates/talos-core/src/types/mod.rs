//! Type definitions for Talos configuration and update settings

mod config_types;
mod settings;

pub use config_types::*;
pub use settings::*;
