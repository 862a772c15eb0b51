//! Push queue for Talos
//!
//! Scheduled pushes are persisted in a [`Store`](talos_core::Store) keyed by
//! their update identity. This crate provides:
//! - [`PushQueue`]: newer-wins enqueueing, the consumer lock and dead letters
//! - [`CapacityCalculator`]: per-domain sliding windows and repository cooldowns
//! - [`UpdateDataCache`]: what was last notified or prompted per identity

pub mod capacity;
pub mod dead_letter;
pub mod error;
pub mod queue;
pub mod update_data;

pub use capacity::{Capacity, CapacityCalculator};
pub use dead_letter::DeadLetterManager;
pub use error::{Error, Result};
pub use queue::{EnqueueOutcome, PushQueue, QueueLock};
pub use update_data::{ImageUpdateData, UpdateDataCache};
