//! RateBudget - remaining request quota

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the remote request quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    /// Requests allowed per window
    pub limit: u32,

    /// Requests left in the current window
    pub remaining_requests: u32,

    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

impl RateBudget {
    /// No requests left and the reset is still ahead of `now`
    pub fn is_exhausted_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_requests == 0 && self.reset_at > now
    }

    /// Reset time in local time, for log lines and CLI output
    pub fn reset_display(&self) -> String {
        local_display(self.reset_at)
    }
}

/// Render a UTC instant in local time for humans
pub fn local_display(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}
