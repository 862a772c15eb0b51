//! In-memory state shared by the bundled store implementations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StringEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StringEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Every key the store holds, grouped by value type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    strings: BTreeMap<String, StringEntry>,
    #[serde(default)]
    sets: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    sorted: BTreeMap<String, BTreeMap<String, f64>>,
}

fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .map(|ttl| now + ttl)
}

impl StoreState {
    pub(crate) fn get(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        self.strings
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>, now: DateTime<Utc>) {
        self.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: expiry(now, ttl),
            },
        );
    }

    pub(crate) fn set_if_absent(
        &mut self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.get(key, now).is_some() {
            return false;
        }
        self.set(key, value, ttl, now);
        true
    }

    pub(crate) fn delete(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let live_string = self
            .strings
            .remove(key)
            .is_some_and(|entry| entry.is_live(now));
        let set = self.sets.remove(key).is_some();
        let sorted = self.sorted.remove(key).is_some();
        live_string || set || sorted
    }

    pub(crate) fn set_add(&mut self, key: &str, member: &str) -> bool {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string())
    }

    pub(crate) fn set_remove(&mut self, key: &str, member: &str) -> bool {
        let Some(members) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = members.remove(member);
        if members.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    pub(crate) fn set_members(&self, key: &str) -> Vec<String> {
        self.sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn sorted_add(&mut self, key: &str, member: &str, score: f64) {
        self.sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }

    pub(crate) fn sorted_count_by_score(&self, key: &str, min: f64, max: f64) -> u64 {
        self.sorted
            .get(key)
            .map(|members| {
                members
                    .values()
                    .filter(|score| **score >= min && **score <= max)
                    .count() as u64
            })
            .unwrap_or(0)
    }

    pub(crate) fn sorted_remove_by_score(&mut self, key: &str, min: f64, max: f64) -> u64 {
        let Some(members) = self.sorted.get_mut(key) else {
            return 0;
        };
        let before = members.len();
        members.retain(|_, score| *score < min || *score > max);
        let removed = (before - members.len()) as u64;
        if members.is_empty() {
            self.sorted.remove(key);
        }
        removed
    }

    /// Drop expired strings so they are not persisted forever
    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.strings.retain(|_, entry| entry.is_live(now));
    }
}
