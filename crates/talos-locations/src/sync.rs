//! Synchronized group resolution

use crate::identity::IdentityBase;
use crate::location::{AtomicUpdateLocation, SubatomicLocation};
use std::collections::{BTreeMap, BTreeSet};
use talos_core::types::SyncRole;
use tracing::warn;

/// A sync group discarded for this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRejection {
    pub group: String,
    pub reason: String,
}

/// Locations split into standalone ones and valid sync groups
#[derive(Debug, Default)]
pub struct SyncResolution {
    pub standalone: Vec<SubatomicLocation>,
    pub groups: Vec<AtomicUpdateLocation>,
    pub rejected: Vec<GroupRejection>,
}

fn validate(
    members: Vec<SubatomicLocation>,
) -> Result<(SubatomicLocation, Vec<SubatomicLocation>), String> {
    let (parents, children): (Vec<_>, Vec<_>) = members.into_iter().partition(|m| {
        m.settings()
            .sync
            .as_ref()
            .is_some_and(|s| s.role == SyncRole::Parent)
    });

    let mut parents = parents.into_iter();
    let (Some(parent), None) = (parents.next(), parents.next()) else {
        return Err("a group needs exactly one parent".to_string());
    };

    let expected = parent.settings().sync.as_ref().and_then(|s| s.children.clone());
    if let Some(expected) = expected {
        let mut found = BTreeSet::new();
        for child in &children {
            let Some(sync) = &child.settings().sync else {
                continue;
            };
            if !found.insert(sync.id.as_str()) {
                return Err(format!("child id '{}' is used more than once", sync.id));
            }
        }
        let expected: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
        if found != expected {
            let missing: Vec<_> = expected.difference(&found).copied().collect();
            let unexpected: Vec<_> = found.difference(&expected).copied().collect();
            return Err(format!(
                "children do not match the parent's list (missing: [{}], unexpected: [{}])",
                missing.join(", "),
                unexpected.join(", ")
            ));
        }
    }

    Ok((parent, children))
}

/// Withhold every location with `sync` settings and bucket it by group.
///
/// A group is kept only with exactly one parent and, when the parent lists
/// its children, exactly those child ids. Anything else discards the whole
/// group for this cycle.
pub fn resolve_sync_groups(
    base: &IdentityBase,
    locations: impl IntoIterator<Item = SubatomicLocation>,
) -> SyncResolution {
    let mut resolution = SyncResolution::default();
    let mut buckets: BTreeMap<String, Vec<SubatomicLocation>> = BTreeMap::new();

    for location in locations {
        match location.settings().sync.as_ref().map(|s| s.group.clone()) {
            Some(group) => buckets.entry(group).or_default().push(location),
            None => resolution.standalone.push(location),
        }
    }

    for (group, members) in buckets {
        match validate(members) {
            Ok((parent, children)) => {
                resolution
                    .groups
                    .push(AtomicUpdateLocation::new(base, group, parent, children));
            }
            Err(reason) => {
                warn!("Discarding sync group {}: {}", group, reason);
                resolution.rejected.push(GroupRejection { group, reason });
            }
        }
    }

    resolution
}
