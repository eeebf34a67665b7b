//! CommitSource trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::FetchError;
use crate::domain::{CommitRecord, RepoBranchKey, RepoMetadata};
use crate::governor::RateBudget;

/// One request for a page of commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub key: RepoBranchKey,

    /// Only commits at or after this time (first page only)
    pub since: Option<DateTime<Utc>>,

    /// Continuation cursor from the previous page; None for the first page
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(key: RepoBranchKey, since: Option<DateTime<Utc>>) -> Self {
        Self {
            key,
            since,
            cursor: None,
        }
    }

    pub fn next(key: RepoBranchKey, cursor: String) -> Self {
        Self {
            key,
            since: None,
            cursor: Some(cursor),
        }
    }
}

/// One page of commits plus the cursor for the following page
#[derive(Debug, Clone, Default)]
pub struct CommitPage {
    pub commits: Vec<CommitRecord>,
    pub next: Option<String>,
}

/// Remote commit source - one call is one HTTP request
///
/// Implementations report an exhausted quota as `FetchError::QuotaExceeded`
/// and never retry on their own; waiting is the fetcher's job.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Repository metadata (default branch, display name, owner avatar)
    async fn repository(&self, repository: &str) -> Result<RepoMetadata, FetchError>;

    /// One page of commits for a key
    async fn list_commits(&self, request: &PageRequest) -> Result<CommitPage, FetchError>;

    /// Current request quota
    async fn quota(&self) -> Result<RateBudget, FetchError>;
}
