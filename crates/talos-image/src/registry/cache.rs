use super::{ImageInspection, ImageRegistry};
use crate::error::Result;
use crate::reference::ParsedImage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use talos_core::store::keys;
use talos_core::Store;
use tracing::trace;

/// Registry decorator caching tag lists and inspections in the store
pub struct CachedRegistry {
    inner: Arc<dyn ImageRegistry>,
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl CachedRegistry {
    pub fn new(inner: Arc<dyn ImageRegistry>, store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { inner, store, ttl }
    }
}

#[async_trait]
impl ImageRegistry for CachedRegistry {
    async fn list_tags(&self, image: &ParsedImage) -> Result<Vec<String>> {
        let key = keys::registry_tags(image.untagged());
        if let Some(cached) = self.store.get(&key).await? {
            trace!("Tag list cache hit for {}", image.untagged());
            return Ok(serde_json::from_str(&cached)?);
        }

        let tags = self.inner.list_tags(image).await?;
        self.store
            .set(&key, &serde_json::to_string(&tags)?, Some(self.ttl))
            .await?;
        Ok(tags)
    }

    async fn inspect(&self, image: &ParsedImage) -> Result<ImageInspection> {
        let key = keys::registry_inspection(&image.to_string());
        if let Some(cached) = self.store.get(&key).await? {
            trace!("Inspection cache hit for {}", image);
            return Ok(serde_json::from_str(&cached)?);
        }

        let inspection = self.inner.inspect(image).await?;
        self.store
            .set(&key, &serde_json::to_string(&inspection)?, Some(self.ttl))
            .await?;
        Ok(inspection)
    }
}
