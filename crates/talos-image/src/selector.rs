//! Upgrade candidate selection
//!
//! The pool of acceptable tags depends on the shape of the current tag:
//!
//! - no tag: tags equal to the default release, without variant, in registry
//!   order; any change is a digest bump
//! - release name: the same release name with the same variant, in registry
//!   order; any change is a digest bump
//! - version: versions with the same prefix presence, variant and precision,
//!   no downgrades, at most `max_bump` away, highest first
//!
//! Equal version with a different digest is a digest bump, not a no-op.

use crate::error::Result;
use crate::reference::{ParsedImage, ParsedTagAndDigest};
use crate::registry::{ImageInspection, ImageRegistry};
use crate::tag::{ParsedTag, TagParser, TagVersion};
use crate::version::SemanticVersion;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use talos_core::BumpSize;
use tracing::{debug, trace};

/// The upgrade chosen for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedUpgrade {
    pub tag: ParsedTag,
    pub digest: String,
    pub created_at: DateTime<Utc>,
    pub bump: BumpSize,
}

impl SelectedUpgrade {
    /// The reference to write in place of `current`, pinned by digest
    pub fn new_image(&self, current: &ParsedImage) -> ParsedImage {
        // A reference that named no tag keeps naming none
        let tag = current.tag().map(|_| self.tag.clone());
        current.with_tag_and_digest(tag, Some(self.digest.clone()))
    }
}

/// Picks upgrade candidates for images and classifies them
pub struct CandidateSelector {
    registry: Arc<dyn ImageRegistry>,
    tags: TagParser,
}

impl CandidateSelector {
    pub fn new(registry: Arc<dyn ImageRegistry>, tags: TagParser) -> Self {
        Self { registry, tags }
    }

    pub fn tag_parser(&self) -> &TagParser {
        &self.tags
    }

    /// Acceptable tags for `image` under `max_bump`, best first
    pub async fn sorted_candidate_tags(
        &self,
        image: &ParsedImage,
        max_bump: BumpSize,
    ) -> Result<Vec<ParsedTag>> {
        let available: Vec<ParsedTag> = self
            .registry
            .list_tags(image)
            .await?
            .iter()
            .filter_map(|tag| self.tags.try_parse_tag(tag))
            .collect();

        let candidates = self.candidates(image.tag(), available, max_bump);
        trace!(
            "{} candidate tags for {} (max bump {})",
            candidates.len(),
            image,
            max_bump
        );
        Ok(candidates)
    }

    /// Filter and order `available` for the current tag
    pub fn candidates(
        &self,
        current: Option<&ParsedTag>,
        available: Vec<ParsedTag>,
        max_bump: BumpSize,
    ) -> Vec<ParsedTag> {
        let Some(current) = current else {
            return available
                .into_iter()
                .filter(|tag| {
                    tag.release() == Some(self.tags.default_release()) && tag.variant.is_none()
                })
                .collect();
        };

        match &current.version {
            TagVersion::Release(name) => available
                .into_iter()
                .filter(|tag| tag.release() == Some(name.as_str()) && tag.variant == current.variant)
                .collect(),
            TagVersion::Semantic(version) => {
                let mut pool: Vec<ParsedTag> = available
                    .into_iter()
                    .filter(|tag| {
                        let Some(candidate) = tag.semantic() else {
                            return false;
                        };
                        candidate.prefix().is_some() == version.prefix().is_some()
                            && tag.variant == current.variant
                            && SemanticVersion::compare(version, candidate)
                                .as_bump()
                                .is_some_and(|bump| bump <= max_bump)
                    })
                    .collect();
                // Stable sort keeps registry order among equal versions
                pool.sort_by(|a, b| match (a.semantic(), b.semantic()) {
                    (Some(a), Some(b)) => b.numeric_cmp(a),
                    _ => std::cmp::Ordering::Equal,
                });
                pool
            }
        }
    }

    /// Digest and creation time of `image` at `tag`
    pub async fn digest(&self, image: &ParsedImage, tag: &ParsedTag) -> Result<ImageInspection> {
        self.registry.inspect(&image.with_tag(tag.clone())).await
    }

    /// Classify moving from `from` to `to_tag` at `to_digest`; `None` when
    /// nothing would change or the move is not an upgrade
    pub fn is_upgrade(
        &self,
        from: Option<&ParsedTagAndDigest>,
        to_tag: &ParsedTag,
        to_digest: &str,
    ) -> Option<BumpSize> {
        if from.and_then(|f| f.digest.as_deref()) == Some(to_digest) {
            return None;
        }

        match from.and_then(|f| f.tag.as_ref()).map(|t| &t.version) {
            None | Some(TagVersion::Release(_)) => Some(BumpSize::Digest),
            Some(TagVersion::Semantic(current)) => {
                SemanticVersion::compare(current, to_tag.semantic()?).as_bump()
            }
        }
    }

    /// Best upgrade for `image` under `max_bump`, if any
    pub async fn best_upgrade(
        &self,
        image: &ParsedImage,
        max_bump: BumpSize,
    ) -> Result<Option<SelectedUpgrade>> {
        let candidates = self.sorted_candidate_tags(image, max_bump).await?;
        let Some(best) = candidates.into_iter().next() else {
            debug!("No candidate tags for {}", image);
            return Ok(None);
        };

        let inspection = self.digest(image, &best).await?;
        let Some(bump) = self.is_upgrade(image.tag_and_digest(), &best, &inspection.digest)
        else {
            debug!("{} is already at {}@{}", image, best, inspection.digest);
            return Ok(None);
        };

        Ok(Some(SelectedUpgrade {
            tag: best,
            digest: inspection.digest,
            created_at: inspection.created_at,
            bump,
        }))
    }
}
