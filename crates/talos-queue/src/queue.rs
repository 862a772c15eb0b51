//! The persisted push queue

use crate::dead_letter::DeadLetterManager;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use talos_core::store::keys;
use talos_core::types::QueueConfig;
use talos_core::Store;
use talos_locations::{DeadLetter, ScheduledPush};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// What `upsert_and_enqueue` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No push was queued for the identity
    Inserted,
    /// The queued push was older and has been replaced
    Replaced,
    /// The queued push is at least as new; the incoming one was dropped
    KeptExisting,
}

/// Proof of holding the queue lock
#[derive(Debug)]
pub struct QueueLock {
    token: String,
}

impl QueueLock {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Scheduled pushes waiting to be written, keyed by update identity
pub struct PushQueue {
    store: Arc<dyn Store>,
    config: QueueConfig,
    dead_letters: DeadLetterManager,
}

impl PushQueue {
    pub fn new(store: Arc<dyn Store>, config: QueueConfig) -> Self {
        let dead_letters = DeadLetterManager::new(Arc::clone(&store));
        Self {
            store,
            config,
            dead_letters,
        }
    }

    /// Queue `push`, unless a push for the same identity is queued whose new
    /// image is at least as recent
    pub async fn upsert_and_enqueue(&self, push: &ScheduledPush) -> Result<EnqueueOutcome> {
        let id = push.storage_key();
        let outcome = match self.get(&id).await? {
            Some(existing) if existing.new_image_created_on >= push.new_image_created_on => {
                debug!(
                    "Keeping queued push {} ({} is not newer)",
                    push.identity, push.new_image_created_on
                );
                return Ok(EnqueueOutcome::KeptExisting);
            }
            Some(_) => EnqueueOutcome::Replaced,
            None => EnqueueOutcome::Inserted,
        };

        let json = serde_json::to_string(push)?;
        self.store.set(&keys::push(&id), &json, None).await?;
        self.store.set_add(&keys::push_index(), &id).await?;
        info!("Queued {} ({:?})", push.commit_title(), outcome);
        Ok(outcome)
    }

    /// The queued push with storage key `id`
    pub async fn get(&self, id: &str) -> Result<Option<ScheduledPush>> {
        match self.store.get(&keys::push(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Every queued push, oldest scheduled first
    pub async fn queued(&self) -> Result<Vec<ScheduledPush>> {
        let mut pushes = Vec::new();
        for id in self.store.set_members(&keys::push_index()).await? {
            match self.get(&id).await? {
                Some(push) => pushes.push(push),
                None => {
                    warn!("Dropping dangling queue entry {}", id);
                    self.store.set_remove(&keys::push_index(), &id).await?;
                }
            }
        }
        pushes.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(pushes)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.set_members(&keys::push_index()).await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove the push with storage key `id`; returns whether it was queued
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let existed = self.store.delete(&keys::push(id)).await?;
        let indexed = self.store.set_remove(&keys::push_index(), id).await?;
        Ok(existed || indexed)
    }

    /// Remove `push` if it is still the queued version for its identity.
    ///
    /// Scans enqueue without the consumer lock, so a newer push may have
    /// replaced `push` while it was being landed. That newer push stays
    /// queued. Returns whether `push` was removed.
    pub async fn remove_if_current(&self, push: &ScheduledPush) -> Result<bool> {
        let id = push.storage_key();
        match self.get(&id).await? {
            Some(queued) if !queued.is_same_move(push) => {
                info!(
                    "Keeping {} queued, it supersedes the landed {}",
                    queued.commit_title(),
                    push.commit_title()
                );
                Ok(false)
            }
            _ => self.remove(&id).await,
        }
    }

    /// Take the queue lock, waiting up to the configured timeout.
    ///
    /// The lock expires after the configured TTL so a crashed holder cannot
    /// keep the queue locked.
    pub async fn acquire_lock(&self) -> Result<QueueLock> {
        let started = Instant::now();
        let timeout = self.config.lock_timeout();
        loop {
            if let Some(lock) = self.try_acquire_lock().await? {
                return Ok(lock);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(Error::lock_timeout(waited));
            }
            tokio::time::sleep(LOCK_RETRY_INTERVAL.min(timeout - waited)).await;
        }
    }

    /// Take the queue lock if it is free
    pub async fn try_acquire_lock(&self) -> Result<Option<QueueLock>> {
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .store
            .set_if_absent(&keys::queue_lock(), &token, Some(self.config.lock_ttl()))
            .await?;
        if acquired {
            debug!("Acquired queue lock {}", token);
        }
        Ok(acquired.then_some(QueueLock { token }))
    }

    /// Release `lock`; returns false when it had already expired or been taken over
    pub async fn release_lock(&self, lock: QueueLock) -> Result<bool> {
        let key = keys::queue_lock();
        if self.store.get(&key).await?.as_deref() != Some(lock.token()) {
            warn!("Queue lock {} was lost before release", lock.token());
            return Ok(false);
        }
        self.store.delete(&key).await?;
        debug!("Released queue lock {}", lock.token());
        Ok(true)
    }

    /// Move a push out of the queue and into the dead letters
    pub async fn dead_letter(&self, letter: DeadLetter) -> Result<()> {
        warn!("Dead-lettering {}: {}", letter.push.commit_title(), letter.reason);
        self.dead_letters.add(&letter).await?;
        self.remove_if_current(&letter.push).await?;
        Ok(())
    }

    pub fn dead_letters(&self) -> &DeadLetterManager {
        &self.dead_letters
    }

    pub async fn dead_letter_count(&self) -> Result<usize> {
        self.dead_letters.count().await
    }

    pub async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.dead_letters.list().await
    }

    /// Re-enqueue every dead letter, discarding the reasons; returns how many
    pub async fn replay_dead_letters(&self) -> Result<usize> {
        let letters = self.dead_letters.list().await?;
        for letter in &letters {
            self.upsert_and_enqueue(&letter.push).await?;
            self.dead_letters.remove(&letter.push.storage_key()).await?;
        }
        if !letters.is_empty() {
            info!("Replayed {} dead letters", letters.len());
        }
        Ok(letters.len())
    }

    /// Delete every dead letter; returns how many
    pub async fn clear_dead_letters(&self) -> Result<usize> {
        self.dead_letters.clear().await
    }
}
