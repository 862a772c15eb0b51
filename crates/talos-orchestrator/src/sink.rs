//! Where notifications and approval prompts go

use crate::error::Result;
use async_trait::async_trait;
use talos_locations::ScheduledPush;
use tracing::info;
use uuid::Uuid;

/// Receives updates that are announced rather than pushed
#[async_trait]
pub trait InteractionSink: Send + Sync {
    /// Ask for approval of `push`; returns the interaction id
    async fn create_interaction(&self, push: &ScheduledPush) -> Result<String>;

    /// Withdraw a pending interaction
    async fn delete_interaction(&self, id: &str) -> Result<()>;

    /// Announce `push` without asking for anything
    async fn notify(&self, push: &ScheduledPush) -> Result<()>;
}

/// Sink that only records to the log
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl InteractionSink for LoggingSink {
    async fn create_interaction(&self, push: &ScheduledPush) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        info!(
            interaction = %id,
            identity = %push.identity,
            bump = %push.bump_size,
            "Approval requested: {} ({} -> {})",
            push.commit_title(),
            push.current_images(),
            push.new_images()
        );
        Ok(id)
    }

    async fn delete_interaction(&self, id: &str) -> Result<()> {
        info!(interaction = %id, "Approval request withdrawn");
        Ok(())
    }

    async fn notify(&self, push: &ScheduledPush) -> Result<()> {
        info!(
            identity = %push.identity,
            bump = %push.bump_size,
            "Update available: {} ({} -> {})",
            push.commit_title(),
            push.current_images(),
            push.new_images()
        );
        Ok(())
    }
}
