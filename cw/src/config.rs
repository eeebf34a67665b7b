//! commitwatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::RepoSpec;
use crate::engine::SchedulerConfig;
use crate::governor::GovernorConfig;

/// Environment variable holding comma-separated repository entries
pub const REPOS_ENV: &str = "REPOS";

/// Environment variable holding the poll interval in seconds
pub const CHECK_INTERVAL_ENV: &str = "CHECK_INTERVAL";

/// Main commitwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watched repositories: `owner/name` or `owner/name:branch`
    pub repos: Vec<String>,

    /// GitHub API configuration
    pub github: GithubConfig,

    /// Polling and rate limit configuration
    pub poll: PollConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Notification configuration
    pub notify: NotifyConfig,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.repos.is_empty() {
            return Err(eyre::eyre!(
                "No repositories configured. Set `repos` in the config file or the {} environment variable.",
                REPOS_ENV
            ));
        }
        self.repo_specs()?;

        if self.poll.interval_secs == 0 {
            return Err(eyre::eyre!("poll.interval-secs must be greater than zero"));
        }
        if self.poll.max_concurrent == 0 {
            return Err(eyre::eyre!("poll.max-concurrent must be greater than zero"));
        }
        if self.github.per_page == 0 {
            return Err(eyre::eyre!("github.per-page must be greater than zero"));
        }
        Ok(())
    }

    /// Parse every configured repository entry
    pub fn repo_specs(&self) -> Result<Vec<RepoSpec>> {
        self.repos
            .iter()
            .map(|entry| {
                entry
                    .parse::<RepoSpec>()
                    .context(format!("Invalid repository entry '{}'", entry))
            })
            .collect()
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env()?;
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .commitwatch.yml
        let local_config = PathBuf::from(".commitwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/commitwatch/commitwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("commitwatch").join("commitwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply `REPOS` and `CHECK_INTERVAL` from the environment
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(repos) = std::env::var(REPOS_ENV) {
            let repos: Vec<String> = repos
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
            if !repos.is_empty() {
                tracing::debug!(count = repos.len(), "apply_env: repos from environment");
                self.repos = repos;
            }
        }

        if let Ok(interval) = std::env::var(CHECK_INTERVAL_ENV) {
            self.poll.interval_secs = interval
                .trim()
                .parse()
                .context(format!("{} must be a whole number of seconds", CHECK_INTERVAL_ENV))?;
            tracing::debug!(interval_secs = self.poll.interval_secs, "apply_env: interval from environment");
        }
        Ok(())
    }
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Commits per page (GitHub caps this at 100)
    #[serde(rename = "per-page")]
    pub per_page: u32,

    /// User-Agent header, required by GitHub
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            timeout_ms: 30_000,
            per_page: 100,
            user_agent: format!("commitwatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GithubConfig {
    /// The API token, if its environment variable is set and non-empty
    pub fn get_token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.trim().is_empty())
    }
}

/// Polling and rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between cycles
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,

    /// Interval multiplier applied after a cycle skipped for low quota
    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: u32,

    /// Maximum keys processed concurrently
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Requests one key is expected to cost per cycle
    #[serde(rename = "request-cost")]
    pub request_cost: u32,

    /// Longest single sleep while waiting for a quota reset, in milliseconds
    #[serde(rename = "wait-slice-ms")]
    pub wait_slice_ms: u64,

    /// Extra seconds to wait past the advertised reset
    #[serde(rename = "reset-grace-secs")]
    pub reset_grace_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let governor = GovernorConfig::default();
        Self {
            interval_secs: 60,
            backoff_multiplier: 2,
            max_concurrent: 8,
            request_cost: governor.request_cost,
            wait_slice_ms: governor.wait_slice_ms,
            reset_grace_secs: governor.reset_grace_secs,
        }
    }
}

impl PollConfig {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.interval_secs),
            backoff_multiplier: self.backoff_multiplier.max(1),
            max_concurrent: self.max_concurrent,
        }
    }

    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            request_cost: self.request_cost,
            wait_slice_ms: self.wait_slice_ms,
            reset_grace_secs: self.reset_grace_secs,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON commit log
    #[serde(rename = "log-path")]
    pub log_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/commitwatch on Linux)
        let log_path = dirs::data_dir()
            .map(|d| d.join("commitwatch"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("commit_log.json");

        Self { log_path }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Environment variable containing the Discord webhook URL
    #[serde(rename = "webhook-url-env")]
    pub webhook_url_env: String,

    /// Webhook request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url_env: "DISCORD_WEBHOOK_URL".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl NotifyConfig {
    /// The webhook URL, if its environment variable is set and non-empty
    pub fn get_webhook_url(&self) -> Option<String> {
        std::env::var(&self.webhook_url_env).ok().filter(|u| !u.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.repos.is_empty());
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.notify.webhook_url_env, "DISCORD_WEBHOOK_URL");
        assert!(config.storage.log_path.ends_with("commit_log.json"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
repos:
  - acme/widgets
  - acme/gadgets:develop
github:
  base-url: https://ghe.example.com/api/v3
  token-env: GHE_TOKEN
  per-page: 50
poll:
  interval-secs: 120
  backoff-multiplier: 3
  max-concurrent: 2
  request-cost: 4
storage:
  log-path: /var/lib/commitwatch/log.json
notify:
  webhook-url-env: MY_HOOK
log-level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.repos, vec!["acme/widgets", "acme/gadgets:develop"]);
        assert_eq!(config.github.base_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.github.token_env, "GHE_TOKEN");
        assert_eq!(config.github.per_page, 50);
        assert_eq!(config.poll.interval_secs, 120);
        assert_eq!(config.poll.request_cost, 4);
        assert_eq!(config.storage.log_path, PathBuf::from("/var/lib/commitwatch/log.json"));
        assert_eq!(config.notify.webhook_url_env, "MY_HOOK");
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let scheduler = config.poll.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(120));
        assert_eq!(scheduler.backoff_interval(), Duration::from_secs(360));
        assert_eq!(scheduler.max_concurrent, 2);
        assert_eq!(config.poll.governor_config().request_cost, 4);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
poll:
  interval-secs: 30
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll.interval_secs, 30);
        assert_eq!(config.poll.max_concurrent, 8);
        assert_eq!(config.poll.wait_slice_ms, 1000);
        assert_eq!(config.github.per_page, 100);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.repos = vec!["acme/widgets".to_string()];
        assert!(config.validate().is_ok());

        config.repos.push("not-a-repo".to_string());
        assert!(config.validate().is_err());
        config.repos.pop();

        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());
        config.poll.interval_secs = 60;

        config.poll.max_concurrent = 0;
        assert!(config.validate().is_err());
        config.poll.max_concurrent = 1;

        config.github.per_page = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cw.yml");
        fs::write(&path, "repos: [acme/widgets]\n").unwrap();

        let config = Config::load_file(Some(&path)).unwrap();
        assert_eq!(config.repos, vec!["acme/widgets"]);

        let missing = dir.path().join("missing.yml");
        assert!(Config::load_file(Some(&missing)).is_err());
    }
}
