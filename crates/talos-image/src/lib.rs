//! Container image handling for Talos
//!
//! This crate provides functionality for:
//! - Parsing and formatting image references (`domain/namespace/name:tag@digest`)
//! - Interpreting tags as numeric versions or named releases
//! - Querying OCI-compatible container registries, with a store-backed cache
//! - Selecting the best upgrade candidate under a bump ceiling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use talos_core::types::{BumpSize, RegistryConfig};
//! use talos_image::{CandidateSelector, HttpRegistryClient, ParsedImage, TagParser};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistryConfig::default();
//! let tags = TagParser::from_config(&config);
//! let registry = Arc::new(HttpRegistryClient::new(&config)?);
//! let selector = CandidateSelector::new(registry, tags.clone());
//!
//! let image = ParsedImage::parse("ghcr.io/acme/api:v2.3.3", false, &tags)?;
//! if let Some(upgrade) = selector.best_upgrade(&image, BumpSize::Patch).await? {
//!     println!("{} -> {} ({})", image, upgrade.new_image(&image), upgrade.bump);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod reference;
pub mod registry;
pub mod selector;
pub mod tag;
pub mod version;

pub use error::{Error, Result};
pub use reference::{ParsedImage, ParsedTagAndDigest, DEFAULT_DOMAIN, DEFAULT_NAMESPACE};
pub use registry::{CachedRegistry, HttpRegistryClient, ImageInspection, ImageRegistry};
pub use selector::{CandidateSelector, SelectedUpgrade};
pub use tag::{ParsedTag, TagParser, TagVersion};
pub use version::{Precision, SemanticVersion, SemanticVersionSize};
