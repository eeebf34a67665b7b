//! Watch engine
//!
//! Resolves configured repositories into keys, bootstraps new keys,
//! polls ready ones, and schedules the per-key work.

mod bootstrap;
mod context;
mod error;
mod poller;
mod scheduler;
mod state;


pub use bootstrap::BootstrapReport;
pub use context::Engine;
pub use error::{ConfigError, PollError};
pub use poller::{PollReport, StepOutcome, sort_ascending};
pub use scheduler::{CycleOutcome, Scheduler, SchedulerConfig};
pub use state::{EngineState, KeyPhase, Target, TargetState};
