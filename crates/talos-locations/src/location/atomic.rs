use super::SubatomicLocation;
use crate::error::Result;
use crate::identity::{IdentityBase, UpdateIdentity};
use crate::push::{ImageUpdateOperation, ImageWriter, PendingWrite, ScheduledPush};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use talos_core::TalosSettings;
use talos_image::{CandidateSelector, ParsedImage, ParsedTag};
use tracing::{debug, warn};

/// A sync group moved as one unit
#[derive(Debug, Clone)]
pub struct AtomicUpdateLocation {
    pub identity: UpdateIdentity,
    pub group: String,
    /// The parent's settings; they pick the strategy and digest sync
    pub settings: TalosSettings,
    /// Parent first, then children in scan order
    pub children: Vec<SubatomicLocation>,
}

impl AtomicUpdateLocation {
    pub fn new(
        base: &IdentityBase,
        group: impl Into<String>,
        parent: SubatomicLocation,
        children: Vec<SubatomicLocation>,
    ) -> Self {
        let group = group.into();
        let settings = parent.settings().clone();
        let mut members = vec![parent];
        members.extend(children);
        let identity = UpdateIdentity::atomic(
            base,
            members.iter().map(|m| m.identity()),
            format!("sync:{}", group),
        );
        Self {
            identity,
            group,
            settings,
            children: members,
        }
    }

    fn requires_digest_sync(&self) -> bool {
        self.settings.sync.as_ref().is_some_and(|s| s.digest)
    }

    /// Pick the best tag acceptable to every member under its own ceiling
    /// and build one push moving all members that change.
    ///
    /// Yields nothing when any member has no candidate in common with the
    /// others, or when digest sync is required and the members resolve to
    /// more than one digest.
    pub async fn create_scheduled_push(
        &self,
        selector: &CandidateSelector,
    ) -> Result<Option<ScheduledPush>> {
        let mut members: Vec<(&SubatomicLocation, ParsedImage, Vec<ParsedTag>)> = Vec::new();
        let mut common: Option<Vec<String>> = None;

        for child in &self.children {
            let image = child.current_image(selector.tag_parser())?;
            let candidates = selector
                .sorted_candidate_tags(&image, child.settings().bump)
                .await?;
            let names: Vec<String> = candidates.iter().map(|t| t.to_string()).collect();
            common = Some(match common {
                None => names,
                Some(previous) => previous.into_iter().filter(|t| names.contains(t)).collect(),
            });
            members.push((child, image, candidates));
        }

        let Some(best) = common.and_then(|c| c.into_iter().next()) else {
            debug!("Sync group {} has no tag common to every member", self.group);
            return Ok(None);
        };

        let mut digests = BTreeSet::new();
        let mut writes = Vec::new();
        let mut bump = None;
        let mut created_on: Option<DateTime<Utc>> = None;
        let mut updates_per_domain: BTreeMap<String, u32> = BTreeMap::new();
        let mut details = Vec::new();

        for (child, image, candidates) in &members {
            let Some(tag) = candidates.iter().find(|t| t.to_string() == best) else {
                continue;
            };
            let inspection = selector.digest(image, tag).await?;
            digests.insert(inspection.digest.clone());

            let Some(child_bump) =
                selector.is_upgrade(image.tag_and_digest(), tag, &inspection.digest)
            else {
                continue;
            };

            let new_image = image.with_tag_and_digest(
                image.tag().map(|_| tag.clone()),
                Some(inspection.digest.clone()),
            );
            details.push(format!(
                "{}: {} -> {} ({})",
                child.identity().short_friendly_hash_data,
                image,
                new_image,
                child_bump
            ));
            *updates_per_domain
                .entry(image.domain_or_default().to_string())
                .or_default() += 1;
            bump = bump.max(Some(child_bump));
            created_on = created_on.max(Some(inspection.created_at));
            writes.push(PendingWrite {
                location: (*child).clone(),
                operation: ImageUpdateOperation {
                    new_image: new_image.to_string(),
                    new_image_created_on: inspection.created_at,
                    bump_size: child_bump,
                },
            });
        }

        if self.requires_digest_sync() && digests.len() != 1 {
            warn!(
                "Sync group {} resolved {} to {} distinct digests, abandoning",
                self.group,
                best,
                digests.len()
            );
            return Ok(None);
        }

        let (Some(bump), Some(created_on)) = (bump, created_on) else {
            debug!("Sync group {} is already at {}", self.group, best);
            return Ok(None);
        };

        Ok(Some(ScheduledPush {
            identity: self.identity.clone(),
            bump_size: bump,
            writer: ImageWriter { writes },
            commit_message: format!(
                "Update sync group {} to {}\n\n{}",
                self.group,
                best,
                details.join("\n")
            ),
            updates_per_domain,
            new_image_created_on: created_on,
            scheduled_at: Utc::now(),
        }))
    }
}
