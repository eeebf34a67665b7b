//! Rate limit governor
//!
//! Tracks the remote request quota, gates outbound requests while it is
//! exhausted, and tells the scheduler when a cycle should be skipped.

mod budget;
mod config;
mod core;

pub use budget::{RateBudget, local_display};
pub use config::GovernorConfig;
pub use core::Governor;
