//! Governor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Governor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Requests one key is expected to spend per cycle
    #[serde(default = "default_request_cost")]
    pub request_cost: u32,

    /// Longest single sleep while waiting for a reset, in milliseconds
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,

    /// Extra wait after the advertised reset time, in seconds
    #[serde(default = "default_reset_grace_secs")]
    pub reset_grace_secs: u64,
}

fn default_request_cost() -> u32 {
    2
}

fn default_wait_slice_ms() -> u64 {
    1000
}

fn default_reset_grace_secs() -> u64 {
    1
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            request_cost: default_request_cost(),
            wait_slice_ms: default_wait_slice_ms(),
            reset_grace_secs: default_reset_grace_secs(),
        }
    }
}

impl GovernorConfig {
    pub fn wait_slice(&self) -> Duration {
        Duration::from_millis(self.wait_slice_ms)
    }

    pub fn reset_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reset_grace_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernorConfig::default();
        assert_eq!(config.request_cost, 2);
        assert_eq!(config.wait_slice(), Duration::from_secs(1));
        assert_eq!(config.reset_grace(), chrono::Duration::seconds(1));
    }
}
