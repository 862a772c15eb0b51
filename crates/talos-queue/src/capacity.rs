//! Throttling
//!
//! Landed pushes are recorded in sliding windows persisted as scored sets
//! (score = landing time in seconds): one per registry domain and one per
//! repository branch. A pass computes a [`Capacity`] once and spends it as
//! pushes are admitted.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use talos_core::store::keys;
use talos_core::types::ThrottleLimit;
use talos_core::Store;
use talos_locations::ScheduledPush;
use tracing::debug;
use uuid::Uuid;

fn seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

fn window_start(now: DateTime<Utc>, window: Duration) -> f64 {
    seconds(now) - window.as_secs_f64()
}

/// Remaining pushes per throttled domain for one consumer pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capacity {
    remaining: BTreeMap<String, u32>,
}

impl Capacity {
    /// Capacity with no throttled domain
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Remaining pushes for `domain`; `None` when it is not throttled
    pub fn remaining(&self, domain: &str) -> Option<u32> {
        self.remaining.get(domain).copied()
    }

    /// Whether every domain `push` touches has room
    pub fn allows(&self, push: &ScheduledPush) -> bool {
        push.updates_per_domain
            .keys()
            .all(|domain| self.remaining(domain).is_none_or(|left| left > 0))
    }

    /// Spend one unit in every domain `push` touches, or nothing at all
    pub fn try_reserve(&mut self, push: &ScheduledPush) -> bool {
        if !self.allows(push) {
            return false;
        }
        for domain in push.updates_per_domain.keys() {
            if let Some(left) = self.remaining.get_mut(domain) {
                *left -= 1;
            }
        }
        true
    }
}

/// Computes capacity and repository cooldowns from the landed-push windows
pub struct CapacityCalculator {
    store: Arc<dyn Store>,
    throttle: BTreeMap<String, ThrottleLimit>,
}

impl CapacityCalculator {
    pub fn new(store: Arc<dyn Store>, throttle: BTreeMap<String, ThrottleLimit>) -> Self {
        Self { store, throttle }
    }

    fn longest_window(&self) -> Duration {
        self.throttle
            .values()
            .map(ThrottleLimit::window)
            .max()
            .unwrap_or_default()
    }

    pub async fn calculate(&self) -> Result<Capacity> {
        self.calculate_at(Utc::now()).await
    }

    /// Capacity left in each throttled domain's window ending at `now`
    pub async fn calculate_at(&self, now: DateTime<Utc>) -> Result<Capacity> {
        let mut remaining = BTreeMap::new();
        for (domain, limit) in &self.throttle {
            let used = self
                .store
                .sorted_count_by_score(
                    &keys::domain_window(domain),
                    window_start(now, limit.window()),
                    f64::INFINITY,
                )
                .await?;
            let used = u32::try_from(used).unwrap_or(u32::MAX);
            let left = limit.limit.saturating_sub(used);
            debug!("Domain {}: {} of {} pushes left", domain, left, limit.limit);
            remaining.insert(domain.clone(), left);
        }
        Ok(Capacity { remaining })
    }

    pub async fn in_cooldown(
        &self,
        remote: &str,
        branch: Option<&str>,
        cooldown: Duration,
    ) -> Result<bool> {
        self.in_cooldown_at(remote, branch, cooldown, Utc::now()).await
    }

    /// Whether a push landed on (`remote`, `branch`) within `cooldown` of `now`
    pub async fn in_cooldown_at(
        &self,
        remote: &str,
        branch: Option<&str>,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if cooldown.is_zero() {
            return Ok(false);
        }
        let landed = self
            .store
            .sorted_count_by_score(
                &keys::repository_window(remote, branch),
                window_start(now, cooldown),
                f64::INFINITY,
            )
            .await?;
        Ok(landed > 0)
    }

    pub async fn record_landed(&self, push: &ScheduledPush, cooldown: Duration) -> Result<()> {
        self.record_landed_at(push, cooldown, Utc::now()).await
    }

    /// Append `push` to its domain and repository windows and prune entries
    /// that no window can see any more
    pub async fn record_landed_at(
        &self,
        push: &ScheduledPush,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let score = seconds(now);
        let member = format!("{}:{}", push.storage_key(), Uuid::new_v4());
        let longest = self.longest_window();

        for domain in push.updates_per_domain.keys() {
            let window = self
                .throttle
                .get(domain)
                .map(ThrottleLimit::window)
                .unwrap_or(longest);
            if window.is_zero() {
                continue;
            }
            let key = keys::domain_window(domain);
            self.store.sorted_add(&key, &member, score).await?;
            self.store
                .sorted_remove_by_score(&key, f64::NEG_INFINITY, window_start(now, window))
                .await?;
        }

        if !cooldown.is_zero() {
            let identity = &push.identity;
            let key =
                keys::repository_window(&identity.git_remote_url, identity.git_branch.as_deref());
            self.store.sorted_add(&key, &member, score).await?;
            self.store
                .sorted_remove_by_score(&key, f64::NEG_INFINITY, window_start(now, cooldown))
                .await?;
        }
        Ok(())
    }
}
