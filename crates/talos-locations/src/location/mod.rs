//! The location family
//!
//! [`SubatomicLocation`] covers the three places a single image reference
//! can live; [`UpdateLocation`] adds the [`AtomicUpdateLocation`] composite
//! built from a sync group. Each subatomic kind carries its own coordinates
//! and the [`Snapshot`] recorded when it was scanned.

mod atomic;
pub(crate) mod compose;
mod dockerfile;
mod yaml;

pub use atomic::AtomicUpdateLocation;
pub use compose::ComposeLocation;
pub use dockerfile::DockerfileLocation;
pub use yaml::YamlLocation;

use crate::error::{Error, Result};
use crate::identity::{LocationKind, UpdateIdentity};
use crate::push::{ImageUpdateOperation, ImageWriter, PendingWrite, ScheduledPush};
use crate::stage::{FileStage, StagingBuffer};
use camino::Utf8Path;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use talos_core::TalosSettings;
use talos_image::{CandidateSelector, ParsedImage, TagParser};
use tracing::debug;

/// What a location looked like when it was last read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Image reference exactly as written
    pub image: String,
    /// Whole line holding the reference, for line-addressed kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl Snapshot {
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            line: None,
        }
    }
}

/// A single image reference in a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SubatomicLocation {
    Dockerfile(DockerfileLocation),
    Compose(ComposeLocation),
    Yaml(YamlLocation),
}

impl SubatomicLocation {
    pub fn kind(&self) -> LocationKind {
        match self {
            Self::Dockerfile(_) => LocationKind::Dockerfile,
            Self::Compose(_) => LocationKind::Compose,
            Self::Yaml(_) => LocationKind::Yaml,
        }
    }

    pub fn identity(&self) -> &UpdateIdentity {
        match self {
            Self::Dockerfile(l) => &l.identity,
            Self::Compose(l) => &l.identity,
            Self::Yaml(l) => &l.identity,
        }
    }

    pub fn settings(&self) -> &TalosSettings {
        match self {
            Self::Dockerfile(l) => &l.settings,
            Self::Compose(l) => &l.settings,
            Self::Yaml(l) => &l.settings,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Self::Dockerfile(l) => &l.snapshot,
            Self::Compose(l) => &l.snapshot,
            Self::Yaml(l) => &l.snapshot,
        }
    }

    /// Repository-relative file holding the reference
    pub fn file(&self) -> &Utf8Path {
        match self {
            Self::Dockerfile(l) => &l.file,
            Self::Compose(l) => &l.file,
            Self::Yaml(l) => &l.file,
        }
    }

    /// Byte offset the edit starts at, where the kind addresses by offset
    fn offset(&self) -> usize {
        match self {
            Self::Yaml(l) => l.start,
            Self::Dockerfile(_) | Self::Compose(_) => 0,
        }
    }

    /// The recorded image, parsed
    pub fn current_image(&self, tags: &TagParser) -> Result<ParsedImage> {
        Ok(ParsedImage::parse(&self.snapshot().image, false, tags)?)
    }

    /// Re-read the file through `stage`, check the reference is still where
    /// and what it was, and stage the replacement.
    ///
    /// Fails with [`Error::ConcurrencyConflict`] when the file changed since
    /// the scan; nothing is staged in that case.
    pub fn stage_write(
        &self,
        operation: &ImageUpdateOperation,
        stage: &mut dyn FileStage,
    ) -> Result<Snapshot> {
        let snapshot = match self {
            Self::Dockerfile(l) => l.stage_write(&operation.new_image, stage),
            Self::Compose(l) => l.stage_write(&operation.new_image, stage),
            Self::Yaml(l) => l.stage_write(&operation.new_image, stage),
        }?;
        debug!(
            "Staged {} -> {} in {}",
            self.snapshot().image,
            operation.new_image,
            self.file()
        );
        Ok(snapshot)
    }

    /// Stage and immediately write to the working tree at `repository_dir`
    pub fn write(
        &self,
        operation: &ImageUpdateOperation,
        repository_dir: &Utf8Path,
    ) -> Result<Snapshot> {
        let mut buffer = StagingBuffer::new(repository_dir);
        let snapshot = self.stage_write(operation, &mut buffer)?;
        buffer.commit()?;
        Ok(snapshot)
    }

    /// Find the best upgrade under this location's ceiling and turn it into a push
    pub async fn create_scheduled_push(
        &self,
        selector: &CandidateSelector,
    ) -> Result<Option<ScheduledPush>> {
        let image = self.current_image(selector.tag_parser())?;
        let Some(upgrade) = selector
            .best_upgrade(&image, self.settings().bump)
            .await?
        else {
            return Ok(None);
        };

        let new_image = upgrade.new_image(&image);
        let operation = ImageUpdateOperation {
            new_image: new_image.to_string(),
            new_image_created_on: upgrade.created_at,
            bump_size: upgrade.bump,
        };

        let commit_message = format!(
            "Update {} to {}\n\n{}: {} -> {} ({})",
            image.untagged(),
            describe_version(&new_image),
            self.identity().short_friendly_hash_data,
            image,
            new_image,
            upgrade.bump
        );

        let mut updates_per_domain = BTreeMap::new();
        updates_per_domain.insert(image.domain_or_default().to_string(), 1);

        Ok(Some(ScheduledPush {
            identity: self.identity().clone(),
            bump_size: upgrade.bump,
            writer: ImageWriter {
                writes: vec![PendingWrite {
                    location: self.clone(),
                    operation: operation.clone(),
                }],
            },
            commit_message,
            updates_per_domain,
            new_image_created_on: operation.new_image_created_on,
            scheduled_at: Utc::now(),
        }))
    }

    /// Sort key for staging several edits into one buffer: by file, and back
    /// to front within a file
    pub(crate) fn stage_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.file()
            .cmp(b.file())
            .then_with(|| b.offset().cmp(&a.offset()))
    }
}

/// Tag if present, otherwise the digest
pub(crate) fn describe_version(image: &ParsedImage) -> String {
    match (image.tag(), image.digest()) {
        (Some(tag), _) => tag.to_string(),
        (None, Some(digest)) => digest.to_string(),
        (None, None) => image.to_string(),
    }
}

/// Any location Talos can update
#[derive(Debug, Clone)]
pub enum UpdateLocation {
    Subatomic(SubatomicLocation),
    Atomic(AtomicUpdateLocation),
}

impl UpdateLocation {
    pub fn identity(&self) -> &UpdateIdentity {
        match self {
            Self::Subatomic(l) => l.identity(),
            Self::Atomic(l) => &l.identity,
        }
    }

    /// Settings that decide the strategy; a group follows its parent
    pub fn settings(&self) -> &TalosSettings {
        match self {
            Self::Subatomic(l) => l.settings(),
            Self::Atomic(l) => &l.settings,
        }
    }

    pub async fn create_scheduled_push(
        &self,
        selector: &CandidateSelector,
    ) -> Result<Option<ScheduledPush>> {
        match self {
            Self::Subatomic(l) => l.create_scheduled_push(selector).await,
            Self::Atomic(l) => l.create_scheduled_push(selector).await,
        }
    }
}

/// Byte range of the line at `index` (0-based), excluding the line ending
pub(crate) fn line_bounds(content: &str, index: usize) -> Option<(usize, usize)> {
    let mut start = 0;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        if i == index {
            let body = line.trim_end_matches('\n').trim_end_matches('\r');
            return Some((start, start + body.len()));
        }
        start += line.len();
    }
    None
}

/// `content` with `start..end` replaced
pub(crate) fn splice(content: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..start]);
    out.push_str(replacement);
    out.push_str(&content[end..]);
    out
}

/// Check the recorded image still sits at `start..end`
pub(crate) fn expect_span(
    path: &Utf8Path,
    content: &str,
    start: usize,
    end: usize,
    expected: &str,
) -> Result<()> {
    match content.get(start..end) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(Error::conflict(
            path,
            format!("expected '{}' at {}..{}, found '{}'", expected, start, end, found),
        )),
        None => Err(Error::conflict(
            path,
            format!("expected '{}' at {}..{}, file is shorter", expected, start, end),
        )),
    }
}

/// Byte range of a scalar value starting at `offset` in `line`, with quotes
/// excluded and any trailing comment dropped.
///
/// Anchors, aliases and tags cannot be edited safely and are rejected.
pub(crate) fn scalar_span(line: &str, offset: usize) -> std::result::Result<(usize, usize), String> {
    let rest = &line[offset..];
    let lead = rest.len() - rest.trim_start().len();
    let value = &rest[lead..];
    let start = offset + lead;

    match value.chars().next() {
        None | Some('#') => Err("empty value".to_string()),
        Some('&') | Some('*') => Err("anchors and aliases are not supported".to_string()),
        Some('!') => Err("tagged values are not supported".to_string()),
        Some('|') | Some('>') => Err("block scalars are not supported".to_string()),
        Some('{') | Some('[') => Err("flow collections are not supported".to_string()),
        Some(quote @ ('"' | '\'')) => {
            let inner = &value[1..];
            let close = inner
                .find(quote)
                .ok_or_else(|| "unterminated quoted value".to_string())?;
            if close == 0 {
                return Err("empty value".to_string());
            }
            Ok((start + 1, start + 1 + close))
        }
        Some(_) => {
            let end = value.find(" #").unwrap_or(value.len());
            let trimmed = value[..end].trim_end();
            Ok((start, start + trimmed.len()))
        }
    }
}
