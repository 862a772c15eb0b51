//! Scheduled pushes and dead letters
//!
//! A [`ScheduledPush`] is self-contained: it carries the locations to edit
//! and the edits themselves, so it can be persisted in the queue and
//! replayed against a fresh clone later.

use crate::error::Result;
use crate::identity::UpdateIdentity;
use crate::location::{Snapshot, SubatomicLocation};
use crate::stage::{FileStage, StagingBuffer};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use talos_core::BumpSize;

/// New image to write at one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpdateOperation {
    pub new_image: String,
    pub new_image_created_on: DateTime<Utc>,
    pub bump_size: BumpSize,
}

/// One location and the edit to apply there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub location: SubatomicLocation,
    pub operation: ImageUpdateOperation,
}

/// Every edit of a push, applied all or nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageWriter {
    pub writes: Vec<PendingWrite>,
}

impl ImageWriter {
    /// Stage every edit, one after another, into `stage`
    pub fn stage(&self, stage: &mut dyn FileStage) -> Result<Vec<Snapshot>> {
        let mut ordered: Vec<&PendingWrite> = self.writes.iter().collect();
        ordered.sort_by(|a, b| SubatomicLocation::stage_order(&a.location, &b.location));

        ordered
            .into_iter()
            .map(|w| w.location.stage_write(&w.operation, stage))
            .collect()
    }

    /// Stage everything against the working tree and write only if all staged.
    /// Returns the number of files written.
    pub fn write(&self, repository_dir: &Utf8Path) -> Result<usize> {
        let mut buffer = StagingBuffer::new(repository_dir);
        self.stage(&mut buffer)?;
        buffer.commit()
    }
}

/// A push waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPush {
    pub identity: UpdateIdentity,
    pub bump_size: BumpSize,
    pub writer: ImageWriter,
    /// Title, then a blank line and the body
    pub commit_message: String,
    /// Registry domain -> number of images this push moves there
    pub updates_per_domain: BTreeMap<String, u32>,
    pub new_image_created_on: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl ScheduledPush {
    /// Queue and cache key
    pub fn storage_key(&self) -> String {
        self.identity.storage_key()
    }

    pub fn commit_title(&self) -> &str {
        self.commit_message.lines().next().unwrap_or_default()
    }

    pub fn commit_body(&self) -> Option<&str> {
        self.commit_message
            .split_once("\n\n")
            .map(|(_, body)| body.trim())
            .filter(|body| !body.is_empty())
    }

    /// Whether `other` moves the same identity to the same images
    pub fn is_same_move(&self, other: &ScheduledPush) -> bool {
        self.identity == other.identity
            && self.new_image_created_on == other.new_image_created_on
            && self.new_images() == other.new_images()
    }

    /// Images as they were when the push was created
    pub fn current_images(&self) -> String {
        self.writer
            .writes
            .iter()
            .map(|w| w.location.snapshot().image.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Images the push will write
    pub fn new_images(&self) -> String {
        self.writer
            .writes
            .iter()
            .map(|w| w.operation.new_image.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A push that could not be completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub push: ScheduledPush,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(push: ScheduledPush, reason: impl Into<String>, stack_trace: Option<String>) -> Self {
        Self {
            push,
            reason: reason.into(),
            stack_trace,
            dead_lettered_at: Utc::now(),
        }
    }

    /// Dead letter for an error, with its source chain as the trace
    pub fn from_error(push: ScheduledPush, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        let trace = (!chain.is_empty()).then(|| chain.join("\ncaused by: "));
        Self::new(push, error.to_string(), trace)
    }
}
