//! Bootstrap - record a new key's full history without notifying

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::{debug, info, warn};

use super::context::Engine;
use super::error::PollError;
use super::state::{KeyPhase, TargetState};
use crate::domain::{CommitRecord, RepoBranchKey};

/// Outcome of a completed bootstrap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Commits in the fetched history
    pub fetched: usize,
    /// SHAs newly written to the log
    pub recorded: usize,
}

impl Engine {
    /// Move an unseen key to ready by recording every existing commit as seen
    ///
    /// On failure the key goes back to unseen and is retried next cycle.
    pub async fn bootstrap(&self, state: &mut TargetState) -> Result<BootstrapReport, PollError> {
        debug!(key = %state.key(), "bootstrap: called");
        state.phase = KeyPhase::Initializing;
        info!(key = %state.key(), "Initializing commit log for new key");

        match self.record_history(state.key()).await {
            Ok((report, newest)) => {
                state.phase = KeyPhase::Ready;
                state.watermark = newest;
                info!(
                    key = %state.key(),
                    fetched = report.fetched,
                    recorded = report.recorded,
                    "Initialized commit log"
                );
                Ok(report)
            }
            Err(e) => {
                state.phase = KeyPhase::Unseen;
                if !e.is_cancelled() {
                    warn!(key = %state.key(), error = %e, "Initialization failed, will retry");
                }
                Err(e)
            }
        }
    }

    async fn record_history(
        &self,
        key: &RepoBranchKey,
    ) -> Result<(BootstrapReport, Option<DateTime<Utc>>), PollError> {
        let commits: Vec<CommitRecord> = self.fetcher.fetch_all(key.clone()).try_collect().await?;
        let newest = commits.iter().map(|c| c.committed_at).max();
        let fetched = commits.len();

        let shas = commits.into_iter().map(|c| c.sha).collect();
        let recorded = self.store.mark_seen_and_persist(key, shas).await?;

        Ok((BootstrapReport { fetched, recorded }, newest))
    }
}
