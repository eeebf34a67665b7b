//! commitwatch - announce every new commit exactly once
//!
//! Watches a set of repository branches on GitHub. The first time a branch
//! is seen its whole history is recorded silently; afterwards each new
//! commit is persisted to a durable dedup log and then announced, oldest
//! first, so a restart never repeats or skips an announcement.
//!
//! # Modules
//!
//! - [`domain`] - Keys, commit records, repository metadata
//! - [`store`] - Durable commit log behind a single-writer actor
//! - [`source`] - Remote commit source trait and GitHub implementation
//! - [`governor`] - Request quota tracking and reset waits
//! - [`fetcher`] - Paginated, quota-aware fetching
//! - [`engine`] - Bootstrap, incremental polling, scheduling
//! - [`notify`] - Discord and log notifiers
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fetcher;
pub mod governor;
pub mod notify;
pub mod shutdown;
pub mod source;
pub mod store;

pub use domain::{CommitRecord, RepoBranchKey, RepoSpec};
pub use engine::{Engine, Scheduler};
