//! Scheduled push fixtures

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use talos_core::types::QueueConfig;
use talos_core::{BumpSize, MemoryStore, Store, TalosSettings};
use talos_locations::{
    IdentityBase, ImageUpdateOperation, ImageWriter, LocationKind, PendingWrite, ScheduledPush,
    Snapshot, SubatomicLocation, UpdateIdentity, YamlLocation,
};
use talos_queue::PushQueue;

pub const REMOTE: &str = "https://git.example.com/acme/deploy.git";

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn base() -> IdentityBase {
    IdentityBase::new(REMOTE, Some("main".to_string()))
}

/// A one-location push at `values.yaml` slot `slot`, moving to an image
/// created `minutes` after the epoch, touching `domains`
pub fn push(slot: usize, minutes: i64, domains: &[&str]) -> ScheduledPush {
    let identity = UpdateIdentity::new(
        &base(),
        LocationKind::Yaml,
        &["values.yaml", &slot.to_string()],
        format!("values.yaml:{}", slot),
    );
    let created = epoch() + Duration::minutes(minutes);
    let new_image = format!("app:v1.{}.0@sha:{:03}", minutes, minutes);
    let location = SubatomicLocation::Yaml(YamlLocation {
        identity: identity.clone(),
        settings: TalosSettings::default(),
        file: "values.yaml".into(),
        start: slot * 100,
        end: slot * 100 + 10,
        snapshot: Snapshot::image("app:v1.0.0"),
    });

    ScheduledPush {
        identity,
        bump_size: BumpSize::Minor,
        writer: ImageWriter {
            writes: vec![PendingWrite {
                location,
                operation: ImageUpdateOperation {
                    new_image: new_image.clone(),
                    new_image_created_on: created,
                    bump_size: BumpSize::Minor,
                },
            }],
        },
        commit_message: format!("Update app to {}", new_image),
        updates_per_domain: domains.iter().map(|d| (d.to_string(), 1)).collect(),
        new_image_created_on: created,
        scheduled_at: created,
    }
}

pub fn store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

pub fn queue_config(lock_timeout_secs: u64) -> QueueConfig {
    QueueConfig {
        poll_interval_secs: 1,
        lock_ttl_secs: 60,
        lock_timeout_secs,
    }
}

pub fn queue(store: &Arc<dyn Store>) -> PushQueue {
    PushQueue::new(Arc::clone(store), queue_config(1))
}
