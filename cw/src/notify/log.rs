//! Notifier that writes events to the log

use async_trait::async_trait;
use tracing::info;

use super::{CommitEvent, DeliveryError, Notifier};

/// Fallback notifier used when no webhook is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &CommitEvent) -> Result<(), DeliveryError> {
        let commit = &event.commit;
        info!(
            repository = %event.repository,
            branch = %event.branch,
            sha = %commit.short_sha(),
            author = %commit.author_display_name,
            committed_at = %commit.committed_at,
            url = %commit.html_url,
            "New commit: {}",
            commit.summary()
        );
        Ok(())
    }
}
