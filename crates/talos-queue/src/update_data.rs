//! Notification and interaction state per update identity

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use talos_core::store::keys;
use talos_core::Store;
use talos_locations::ScheduledPush;

/// What was last raised for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdateData {
    /// Images at the location when the update was raised
    pub last_known_snapshot: String,
    /// Images the raised update would write
    pub new_images: String,
    /// Pending interaction id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notified: Option<DateTime<Utc>>,
}

impl ImageUpdateData {
    pub fn for_push(push: &ScheduledPush) -> Self {
        Self {
            last_known_snapshot: push.current_images(),
            new_images: push.new_images(),
            interaction: None,
            last_notified: None,
        }
    }

    /// Whether this entry describes the same move as `push`
    pub fn matches(&self, push: &ScheduledPush) -> bool {
        self.last_known_snapshot == push.current_images() && self.new_images == push.new_images()
    }

    pub fn was_notified_for(&self, push: &ScheduledPush) -> bool {
        self.matches(push) && self.last_notified.is_some()
    }

    pub fn has_interaction_for(&self, push: &ScheduledPush) -> bool {
        self.matches(push) && self.interaction.is_some()
    }
}

/// Store-backed [`ImageUpdateData`] keyed by update identity
pub struct UpdateDataCache {
    store: Arc<dyn Store>,
}

impl UpdateDataCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ImageUpdateData>> {
        match self.store.get(&keys::update_data(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, id: &str, data: &ImageUpdateData) -> Result<()> {
        let json = serde_json::to_string(data)?;
        self.store.set(&keys::update_data(id), &json, None).await?;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(&keys::update_data(id)).await?)
    }
}
