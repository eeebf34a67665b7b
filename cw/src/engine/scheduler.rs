//! Scheduler - fixed-interval dispatch of per-key work
//!
//! Each cycle the scheduler:
//! - Reaps finished tasks and takes back their key state
//! - Asks the governor whether the quota can cover a full cycle
//! - Dispatches one task per idle key onto a bounded pool

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::Engine;
use super::poller::StepOutcome;
use super::state::{EngineState, KeyPhase, TargetState};
use crate::domain::RepoBranchKey;
use crate::governor::RateBudget;
use crate::shutdown::Shutdown;

/// Configuration for the Scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between cycles
    pub interval: Duration,

    /// Pause multiplier after a skipped cycle
    pub backoff_multiplier: u32,

    /// Maximum keys worked on at once
    pub max_concurrent: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            backoff_multiplier: 2,
            max_concurrent: 8,
        }
    }
}

impl SchedulerConfig {
    pub fn backoff_interval(&self) -> Duration {
        self.interval.saturating_mul(self.backoff_multiplier)
    }
}

/// What `run_cycle` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Tasks were dispatched; `busy` keys were still in flight and skipped
    Dispatched { dispatched: usize, busy: usize },
    /// The quota could not cover a full cycle
    BackedOff { budget: RateBudget },
    /// Shutdown was requested before or during dispatch
    Cancelled,
}

struct InFlight {
    handle: JoinHandle<TargetState>,
    /// Returned to the engine state if the task panics
    fallback: TargetState,
}

pub struct Scheduler {
    config: SchedulerConfig,
    engine: Arc<Engine>,
    state: EngineState,
    tasks: HashMap<RepoBranchKey, InFlight>,
    semaphore: Arc<Semaphore>,
    shutdown: Shutdown,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, engine: Arc<Engine>, state: EngineState, shutdown: Shutdown) -> Self {
        debug!(?config, keys = state.len(), "Scheduler::new: called");
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
            engine,
            state,
            tasks: HashMap::new(),
            shutdown,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Run one cycle: reap, consult the governor, dispatch idle keys
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        debug!("run_cycle: called");
        self.reap().await;

        if self.shutdown.is_triggered() {
            return CycleOutcome::Cancelled;
        }

        let governor = self.engine.governor().clone();
        match governor.snapshot().await {
            Ok(budget) => {
                if governor.should_backoff(&budget, self.state.len()) {
                    warn!(
                        remaining = budget.remaining_requests,
                        keys = self.state.len(),
                        resets = %budget.reset_display(),
                        "Quota too low for a full cycle, backing off"
                    );
                    return CycleOutcome::BackedOff { budget };
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh quota, proceeding without it");
            }
        }

        let mut dispatched = 0;
        let mut busy = 0;
        for key in self.state.keys().to_vec() {
            if self.shutdown.is_triggered() {
                debug!(dispatched, "run_cycle: shutdown during dispatch");
                return CycleOutcome::Cancelled;
            }

            match self.state.take(&key) {
                Some(target) => {
                    self.dispatch(target);
                    dispatched += 1;
                    // Let the new task and any signal handler run before the next key
                    tokio::task::yield_now().await;
                }
                None => {
                    debug!(%key, "run_cycle: key still in flight");
                    busy += 1;
                }
            }
        }

        debug!(dispatched, busy, "run_cycle: complete");
        CycleOutcome::Dispatched { dispatched, busy }
    }

    fn dispatch(&mut self, mut target: TargetState) {
        let key = target.key().clone();
        debug!(%key, phase = %target.phase, "dispatch: called");

        let fallback = target.clone();
        let engine = self.engine.clone();
        let semaphore = self.semaphore.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return target;
            };

            match engine.step(&mut target).await {
                Ok(StepOutcome::Bootstrapped(report)) => {
                    debug!(key = %target.key(), ?report, "key task: bootstrapped");
                }
                Ok(StepOutcome::Polled(report)) => {
                    debug!(key = %target.key(), ?report, "key task: polled");
                }
                Err(e) if e.is_cancelled() => {
                    debug!(key = %target.key(), "key task: cancelled by shutdown");
                }
                Err(e) => {
                    warn!(key = %target.key(), error = %e, "Cycle failed for key");
                }
            }
            target
        });

        self.tasks.insert(key, InFlight { handle, fallback });
    }

    /// Take back state from finished tasks
    async fn reap(&mut self) {
        let finished: Vec<RepoBranchKey> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();
        debug!(finished = finished.len(), running = self.tasks.len(), "reap: called");

        for key in finished {
            if let Some(task) = self.tasks.remove(&key) {
                self.settle(key, task).await;
            }
        }
    }

    async fn settle(&mut self, key: RepoBranchKey, task: InFlight) {
        match task.handle.await {
            Ok(target) => self.state.restore(target),
            Err(e) => {
                error!(%key, error = %e, "Key task panicked");
                let mut fallback = task.fallback;
                if fallback.phase == KeyPhase::Initializing {
                    fallback.phase = KeyPhase::Unseen;
                }
                self.state.restore(fallback);
            }
        }
    }

    /// Wait for every in-flight task and take back its state
    pub async fn drain(&mut self) {
        debug!(running = self.tasks.len(), "drain: called");
        let tasks: Vec<(RepoBranchKey, InFlight)> = self.tasks.drain().collect();
        for (key, task) in tasks {
            self.settle(key, task).await;
        }
    }

    /// Cycle until shutdown, then drain
    pub async fn run(&mut self) {
        debug!("run: called");
        info!(
            keys = self.state.len(),
            interval_secs = self.config.interval.as_secs(),
            "Scheduler starting"
        );

        let mut shutdown = self.shutdown.clone();
        loop {
            let pause = match self.run_cycle().await {
                CycleOutcome::Cancelled => break,
                CycleOutcome::BackedOff { .. } => self.config.backoff_interval(),
                CycleOutcome::Dispatched { .. } => self.config.interval,
            };
            debug!(?pause, "run: sleeping");

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.wait() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(running = self.tasks.len(), "Scheduler stopping, waiting for in-flight keys");
        self.drain().await;
        info!("Scheduler stopped");
    }
}
