//! In-memory CommitSource for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::debug;

use super::{CommitPage, CommitSource, FetchError, PageRequest};
use crate::domain::{CommitRecord, RepoBranchKey, RepoMetadata};
use crate::governor::RateBudget;
use crate::shutdown::ShutdownTrigger;

/// A failure to inject into the next call
#[derive(Debug, Clone)]
pub enum MockFailure {
    Quota { reset_at: DateTime<Utc> },
    Api { status: u16 },
}

impl From<MockFailure> for FetchError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::Quota { reset_at } => FetchError::QuotaExceeded { reset_at },
            MockFailure::Api { status } => FetchError::Api {
                status,
                message: "mock failure".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct MockState {
    repos: HashMap<String, RepoMetadata>,
    history: HashMap<RepoBranchKey, Vec<CommitRecord>>,
    scripted: HashMap<RepoBranchKey, VecDeque<Vec<CommitRecord>>>,
    failures: VecDeque<MockFailure>,
    quota: Option<RateBudget>,
    requests: Vec<PageRequest>,
    quota_calls: usize,
    trigger_on_list: Option<ShutdownTrigger>,
}

/// Mock source serving commit history from memory
///
/// History pages newest-first like GitHub. `script` overrides the next
/// first-page response for a key verbatim, ignoring `since`. Repository
/// lookups ignore case like GitHub's.
pub struct MockSource {
    page_size: usize,
    state: Mutex<MockState>,
    panic_next_list: AtomicBool,
}

/// Commit at a fixed base time plus `minutes`
pub fn commit(sha: &str, minutes: i64) -> CommitRecord {
    CommitRecord {
        sha: sha.to_string(),
        committed_at: at(minutes),
        message: format!("Commit {}\n\nBody of {}", sha, sha),
        author_display_name: "Ada Lovelace".to_string(),
        author_avatar_ref: None,
        html_url: format!("https://github.com/acme/widgets/commit/{}", sha),
    }
}

/// Fixed base time plus `minutes`
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn metadata(repository: &str, default_branch: &str) -> RepoMetadata {
    let name = repository.split('/').nth(1).unwrap_or(repository);
    RepoMetadata {
        full_name: repository.to_string(),
        display_name: name.to_string(),
        default_branch: default_branch.to_string(),
        owner_avatar_url: Some("https://avatars.test/acme.png".to_string()),
        html_url: format!("https://github.com/{}", repository),
    }
}

impl MockSource {
    pub fn new(page_size: usize) -> Self {
        debug!(page_size, "MockSource::new: called");
        Self {
            page_size,
            state: Mutex::new(MockState::default()),
            panic_next_list: AtomicBool::new(false),
        }
    }

    pub fn add_repo(&self, meta: RepoMetadata) {
        self.state
            .lock()
            .unwrap()
            .repos
            .insert(meta.full_name.to_lowercase(), meta);
    }

    /// Append commits to a key's history
    pub fn push_commits(&self, key: &RepoBranchKey, commits: Vec<CommitRecord>) {
        self.state
            .lock()
            .unwrap()
            .history
            .entry(key.clone())
            .or_default()
            .extend(commits);
    }

    /// Return exactly `commits` from the next first-page request for `key`
    pub fn script(&self, key: &RepoBranchKey, commits: Vec<CommitRecord>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(key.clone())
            .or_default()
            .push_back(commits);
    }

    /// Fail the next call of any kind
    pub fn fail_next(&self, failure: MockFailure) {
        self.state.lock().unwrap().failures.push_back(failure);
    }

    /// Fire `trigger` when the next commit page is requested
    pub fn trigger_on_list(&self, trigger: ShutdownTrigger) {
        self.state.lock().unwrap().trigger_on_list = Some(trigger);
    }

    /// Panic inside the next commit page request
    pub fn panic_next_list(&self) {
        self.panic_next_list.store(true, Ordering::SeqCst);
    }

    pub fn set_quota(&self, budget: RateBudget) {
        self.state.lock().unwrap().quota = Some(budget);
    }

    /// All commit page requests received so far
    pub fn requests(&self) -> Vec<PageRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn quota_calls(&self) -> usize {
        self.state.lock().unwrap().quota_calls
    }

    fn take_failure(&self) -> Option<FetchError> {
        self.state.lock().unwrap().failures.pop_front().map(FetchError::from)
    }
}

#[async_trait]
impl CommitSource for MockSource {
    async fn repository(&self, repository: &str) -> Result<RepoMetadata, FetchError> {
        debug!(%repository, "MockSource::repository: called");
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        self.state
            .lock()
            .unwrap()
            .repos
            .get(&repository.to_lowercase())
            .cloned()
            .ok_or_else(|| FetchError::Api {
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn list_commits(&self, request: &PageRequest) -> Result<CommitPage, FetchError> {
        debug!(key = %request.key, cursor = ?request.cursor, "MockSource::list_commits: called");
        if self.panic_next_list.swap(false, Ordering::SeqCst) {
            panic!("list_commits panicked for {}", request.key);
        }
        if let Some(e) = self.take_failure() {
            return Err(e);
        }

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if let Some(trigger) = state.trigger_on_list.take() {
            trigger.trigger();
        }

        if request.cursor.is_none()
            && let Some(commits) = state.scripted.get_mut(&request.key).and_then(VecDeque::pop_front)
        {
            return Ok(CommitPage { commits, next: None });
        }

        let mut history: Vec<CommitRecord> = state
            .history
            .get(&request.key)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|c| request.since.is_none_or(|since| c.committed_at >= since))
            .collect();
        history.sort_by(|a, b| b.committed_at.cmp(&a.committed_at));

        let offset: usize = request.cursor.as_deref().and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(history.len());
        let commits = history.get(offset..end).map(<[CommitRecord]>::to_vec).unwrap_or_default();
        let next = (end < history.len()).then(|| end.to_string());

        Ok(CommitPage { commits, next })
    }

    async fn quota(&self) -> Result<RateBudget, FetchError> {
        debug!("MockSource::quota: called");
        if let Some(e) = self.take_failure() {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        state.quota_calls += 1;
        Ok(state.quota.clone().unwrap_or(RateBudget {
            limit: 5000,
            remaining_requests: 5000,
            reset_at: Utc::now() + Duration::hours(1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pages_newest_first() {
        let source = MockSource::new(2);
        let key = RepoBranchKey::new("acme/widgets", "main");
        source.push_commits(&key, vec![commit("a", 1), commit("b", 2), commit("c", 3)]);

        let first = source.list_commits(&PageRequest::first(key.clone(), None)).await.unwrap();
        let shas: Vec<_> = first.commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["c", "b"]);

        let cursor = first.next.unwrap();
        let second = source.list_commits(&PageRequest::next(key, cursor)).await.unwrap();
        assert_eq!(second.commits.len(), 1);
        assert!(second.next.is_none());
    }
}
