//! Incremental poller - notify for commits newer than the watermark

use tracing::{debug, info, warn};

use super::bootstrap::BootstrapReport;
use super::context::Engine;
use super::error::PollError;
use super::state::{KeyPhase, TargetState};
use crate::domain::CommitRecord;

/// Outcome of one incremental poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    /// Recorded and handed to the notifier
    pub new: usize,
    /// Already in the log
    pub skipped: usize,
    pub delivery_failures: usize,
}

/// What one unit of work on a key did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Bootstrapped(BootstrapReport),
    Polled(PollReport),
}

/// Oldest first; SHA breaks timestamp ties so the order is total
pub fn sort_ascending(commits: &mut [CommitRecord]) {
    commits.sort_by(|a, b| a.committed_at.cmp(&b.committed_at).then_with(|| a.sha.cmp(&b.sha)));
}

impl Engine {
    /// Bootstrap an unseen key or poll a ready one
    pub async fn step(&self, state: &mut TargetState) -> Result<StepOutcome, PollError> {
        match state.phase {
            KeyPhase::Unseen | KeyPhase::Initializing => self.bootstrap(state).await.map(StepOutcome::Bootstrapped),
            KeyPhase::Ready => self.poll(state).await.map(StepOutcome::Polled),
        }
    }

    /// Fetch since the watermark and notify each unseen commit, oldest first
    ///
    /// Each SHA is persisted before its notification goes out. A persist
    /// failure aborts the poll with the watermark untouched; a delivery
    /// failure is counted and the SHA stays recorded.
    pub async fn poll(&self, state: &mut TargetState) -> Result<PollReport, PollError> {
        debug!(key = %state.key(), watermark = ?state.watermark, "poll: called");
        let key = state.key().clone();

        let mut commits = self.fetcher.fetch_since(&key, state.watermark).await?;
        sort_ascending(&mut commits);

        let mut report = PollReport {
            fetched: commits.len(),
            ..Default::default()
        };

        for commit in &commits {
            if self.store.has_seen(&key, &commit.sha).await? {
                report.skipped += 1;
                continue;
            }

            self.store.mark_seen_and_persist(&key, vec![commit.sha.clone()]).await?;
            report.new += 1;

            let event = state.target.event(commit.clone());
            if let Err(e) = self.notifier.notify(&event).await {
                warn!(%key, sha = %commit.sha, error = %e, "Failed to deliver notification");
                report.delivery_failures += 1;
            }
        }

        if let Some(last) = commits.last() {
            state.watermark = Some(last.committed_at);
        }

        if report.new > 0 {
            info!(%key, new = report.new, "Reported new commits");
        }
        debug!(%key, ?report, "poll: complete");
        Ok(report)
    }
}
