//! Governor implementation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::budget::{RateBudget, local_display};
use super::config::GovernorConfig;
use crate::shutdown::Shutdown;
use crate::source::{CommitSource, FetchError};

/// The Governor owns the process-wide RateBudget and decides when to wait
pub struct Governor {
    source: Arc<dyn CommitSource>,
    config: GovernorConfig,
    budget: RwLock<Option<RateBudget>>,
}

impl Governor {
    /// Create a new governor with no budget known yet
    pub fn new(source: Arc<dyn CommitSource>, config: GovernorConfig) -> Self {
        debug!(?config, "Governor::new: called");
        Self {
            source,
            config,
            budget: RwLock::new(None),
        }
    }

    /// Query the quota endpoint and remember the result
    pub async fn snapshot(&self) -> Result<RateBudget, FetchError> {
        debug!("Governor::snapshot: called");
        let budget = self.source.quota().await?;
        debug!(
            remaining = budget.remaining_requests,
            limit = budget.limit,
            reset_at = %budget.reset_at,
            "Governor::snapshot: refreshed"
        );
        *self.budget.write().await = Some(budget.clone());
        Ok(budget)
    }

    /// Last known budget, if any snapshot has succeeded
    pub async fn current(&self) -> Option<RateBudget> {
        self.budget.read().await.clone()
    }

    /// True when a full cycle over `watched_key_count` keys could exhaust the quota
    pub fn should_backoff(&self, budget: &RateBudget, watched_key_count: usize) -> bool {
        let needed = watched_key_count as u64 * self.config.request_cost as u64;
        let backoff = (budget.remaining_requests as u64) < needed;
        debug!(
            remaining = budget.remaining_requests,
            needed, backoff, "Governor::should_backoff: evaluated"
        );
        backoff
    }

    /// Called before every request: wait out a known-exhausted quota
    pub async fn gate(&self, shutdown: &Shutdown) -> Result<(), FetchError> {
        let exhausted = self
            .current()
            .await
            .filter(|budget| budget.is_exhausted_at(Utc::now()));

        match exhausted {
            Some(budget) => {
                debug!(reset_at = %budget.reset_at, "Governor::gate: budget exhausted");
                self.wait_for_reset(budget.reset_at, shutdown).await
            }
            None => Ok(()),
        }
    }

    /// Suspend until `reset_at` plus grace, in slices, observing shutdown
    pub async fn wait_for_reset(&self, reset_at: DateTime<Utc>, shutdown: &Shutdown) -> Result<(), FetchError> {
        let deadline = reset_at + self.config.reset_grace();
        info!(resets = %local_display(reset_at), "Request quota exhausted, waiting for reset");

        let mut shutdown = shutdown.clone();
        loop {
            if shutdown.is_triggered() {
                debug!("Governor::wait_for_reset: cancelled");
                return Err(FetchError::Cancelled);
            }

            let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
            if remaining.is_zero() {
                break;
            }

            let slice = remaining.min(self.config.wait_slice());
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = shutdown.wait() => {
                    debug!("Governor::wait_for_reset: shutdown during wait");
                    return Err(FetchError::Cancelled);
                }
            }
        }

        info!("Request quota reset, resuming");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use crate::source::mock::{MockFailure, MockSource};
    use std::time::{Duration, Instant};

    fn budget(remaining: u32, reset_in: chrono::Duration) -> RateBudget {
        RateBudget {
            limit: 5000,
            remaining_requests: remaining,
            reset_at: Utc::now() + reset_in,
        }
    }

    fn governor(source: Arc<MockSource>, config: GovernorConfig) -> Governor {
        Governor::new(source, config)
    }

    fn fast_config() -> GovernorConfig {
        GovernorConfig {
            request_cost: 2,
            wait_slice_ms: 20,
            reset_grace_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_snapshot_records_budget() {
        let source = Arc::new(MockSource::new(10));
        let expected = budget(42, chrono::Duration::minutes(10));
        source.set_quota(expected.clone());

        let gov = governor(source.clone(), fast_config());
        assert!(gov.current().await.is_none());

        let snap = gov.snapshot().await.unwrap();
        assert_eq!(snap, expected);
        assert_eq!(gov.current().await, Some(expected));
        assert_eq!(source.quota_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_keeps_previous_budget() {
        let source = Arc::new(MockSource::new(10));
        let gov = governor(source.clone(), fast_config());
        let first = gov.snapshot().await.unwrap();

        source.fail_next(MockFailure::Api { status: 500 });
        assert!(gov.snapshot().await.is_err());
        assert_eq!(gov.current().await, Some(first));
    }

    #[test]
    fn test_should_backoff_scales_with_fleet_size() {
        let gov = governor(Arc::new(MockSource::new(10)), fast_config());
        let b = budget(10, chrono::Duration::minutes(1));

        assert!(!gov.should_backoff(&b, 5)); // needs 10
        assert!(gov.should_backoff(&b, 6)); // needs 12
        assert!(!gov.should_backoff(&b, 0));
    }

    #[tokio::test]
    async fn test_wait_for_reset_returns_after_reset() {
        let gov = governor(Arc::new(MockSource::new(10)), fast_config());
        let reset_at = Utc::now() + chrono::Duration::milliseconds(150);

        let start = Instant::now();
        gov.wait_for_reset(reset_at, &Shutdown::never()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(Utc::now() >= reset_at);
    }

    #[tokio::test]
    async fn test_wait_for_past_reset_is_immediate() {
        let gov = governor(Arc::new(MockSource::new(10)), fast_config());
        let reset_at = Utc::now() - chrono::Duration::seconds(5);

        let result = tokio::time::timeout(Duration::from_millis(200), gov.wait_for_reset(reset_at, &Shutdown::never())).await;
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_reset_observes_shutdown() {
        let gov = Arc::new(governor(Arc::new(MockSource::new(10)), fast_config()));
        let (trigger, shutdown) = shutdown::channel();
        let reset_at = Utc::now() + chrono::Duration::hours(1);

        let waiter = {
            let gov = gov.clone();
            tokio::spawn(async move { gov.wait_for_reset(reset_at, &shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_gate_passes_with_budget_left() {
        let source = Arc::new(MockSource::new(10));
        source.set_quota(budget(1, chrono::Duration::hours(1)));
        let gov = governor(source, fast_config());
        gov.snapshot().await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), gov.gate(&Shutdown::never())).await;
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_gate_waits_when_exhausted() {
        let source = Arc::new(MockSource::new(10));
        source.set_quota(budget(0, chrono::Duration::milliseconds(150)));
        let gov = governor(source, fast_config());
        gov.snapshot().await.unwrap();

        let start = Instant::now();
        gov.gate(&Shutdown::never()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
