//! Persistent key-value store
//!
//! Talos persists queued pushes, dead letters, throttle windows and cached
//! update data through the narrow [`Store`] interface: strings with an
//! optional TTL, unordered sets, and scored sets with range-by-score queries.
//! Any ordered key-value backend that can provide these operations can stand
//! in for the bundled implementations.

mod file;
pub mod keys;
mod memory;
mod state;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Storage operations used by Talos
#[async_trait]
pub trait Store: Send + Sync {
    /// Get a string value; expired values read as absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Set a string value only if the key is absent (or expired)
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Delete a key of any type; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Add a member to a set; returns whether it was newly added
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set; returns whether it was present
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set, in lexicographic order
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Add or re-score a member of a scored set
    async fn sorted_add(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Count members with `min <= score <= max`
    async fn sorted_count_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64>;

    /// Remove members with `min <= score <= max`; returns how many were removed
    async fn sorted_remove_by_score(&self, key: &str, min: f64, max: f64) -> Result<u64>;
}
