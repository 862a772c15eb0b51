//! Dead-letter storage

use crate::error::Result;
use std::sync::Arc;
use talos_core::store::keys;
use talos_core::Store;
use talos_locations::DeadLetter;
use tracing::warn;

/// Persisted pushes that could not be completed, keyed like the queue
pub struct DeadLetterManager {
    store: Arc<dyn Store>,
}

impl DeadLetterManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Store `letter`, replacing any dead letter for the same identity
    pub async fn add(&self, letter: &DeadLetter) -> Result<()> {
        let id = letter.push.storage_key();
        let json = serde_json::to_string(letter)?;
        self.store.set(&keys::dead_letter(&id), &json, None).await?;
        self.store.set_add(&keys::dead_letter_index(), &id).await?;
        Ok(())
    }

    /// Every dead letter, oldest first
    pub async fn list(&self) -> Result<Vec<DeadLetter>> {
        let mut letters = Vec::new();
        for id in self.store.set_members(&keys::dead_letter_index()).await? {
            match self.store.get(&keys::dead_letter(&id)).await? {
                Some(json) => letters.push(serde_json::from_str::<DeadLetter>(&json)?),
                None => {
                    warn!("Dropping dangling dead-letter entry {}", id);
                    self.store.set_remove(&keys::dead_letter_index(), &id).await?;
                }
            }
        }
        letters.sort_by(|a, b| a.dead_lettered_at.cmp(&b.dead_lettered_at));
        Ok(letters)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self
            .store
            .set_members(&keys::dead_letter_index())
            .await?
            .len())
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        let existed = self.store.delete(&keys::dead_letter(id)).await?;
        self.store.set_remove(&keys::dead_letter_index(), id).await?;
        Ok(existed)
    }

    /// Delete every dead letter; returns how many were removed
    pub async fn clear(&self) -> Result<usize> {
        let ids = self.store.set_members(&keys::dead_letter_index()).await?;
        for id in &ids {
            self.remove(id).await?;
        }
        Ok(ids.len())
    }
}
