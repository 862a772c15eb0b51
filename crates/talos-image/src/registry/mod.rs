//! Registry access
//!
//! The candidate selector only needs two registry operations, so registries
//! are reached through the [`ImageRegistry`] trait. [`HttpRegistryClient`]
//! speaks the OCI distribution API; [`CachedRegistry`] wraps any registry
//! with a store-backed cache.

mod cache;
mod http;

pub use cache::CachedRegistry;
pub use http::HttpRegistryClient;

use crate::error::Result;
use crate::reference::ParsedImage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content digest and creation time of one tagged image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInspection {
    pub digest: String,
    pub created_at: DateTime<Utc>,
}

/// Registry operations used to find upgrades
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// All tags of the image's repository; tag and digest of `image` are ignored.
    ///
    /// Registries typically answer most recent first, and callers rely on
    /// that order when picking among equal candidates.
    async fn list_tags(&self, image: &ParsedImage) -> Result<Vec<String>>;

    /// Digest and creation time of the image's tag (or digest)
    async fn inspect(&self, image: &ParsedImage) -> Result<ImageInspection>;
}
