//! Notifier trait definition

use async_trait::async_trait;

use super::{CommitEvent, DeliveryError};

/// Sink for new-commit events
///
/// Called once per new commit, after the SHA is durably recorded. A failure
/// is logged by the caller and never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &CommitEvent) -> Result<(), DeliveryError>;
}
