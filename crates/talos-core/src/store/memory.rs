//! Process-local store

use super::state::StoreState;
use super::Store;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Store kept entirely in memory; state is lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| Error::store("memory store mutex poisoned"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state()?.get(key, Utc::now()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.state()?.set(key, value, ttl, Utc::now());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        Ok(self.state()?.set_if_absent(key, value, ttl, Utc::now()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.state()?.delete(key, Utc::now()))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.state()?.set_add(key, member))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.state()?.set_remove(key, member))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.state()?.set_members(key))
    }

    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.state()?.sorted_add(key, member, score);
        Ok(())
    }

    async fn sorted_count_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        Ok(self.state()?.sorted_count_by_score(key, min, max))
    }

    async fn sorted_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64> {
        Ok(self.state()?.sorted_remove_by_score(key, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_strings() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert!(!store.set_if_absent("a", "2", None).await.unwrap());
        assert!(store.delete("a").await.unwrap());
        assert!(store.set_if_absent("a", "2", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_sets() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "b").await.unwrap());
        assert!(store.set_add("s", "a").await.unwrap());
        assert!(!store.set_add("s", "a").await.unwrap());
        assert_eq!(store.set_members("s").await.unwrap(), vec!["a", "b"]);
        assert!(store.set_remove("s", "a").await.unwrap());
        assert!(!store.set_remove("s", "a").await.unwrap());
    }
}
