//! Paginated fetcher
//!
//! Wraps a CommitSource with quota gating and quota-exceeded retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, warn};

use crate::domain::{CommitRecord, RepoBranchKey, RepoMetadata};
use crate::governor::Governor;
use crate::shutdown::Shutdown;
use crate::source::{CommitPage, CommitSource, FetchError, PageRequest};

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Fetches commit pages, waiting out an exhausted quota instead of failing
pub struct Fetcher {
    source: Arc<dyn CommitSource>,
    governor: Arc<Governor>,
    shutdown: Shutdown,
}

impl Fetcher {
    pub fn new(source: Arc<dyn CommitSource>, governor: Arc<Governor>, shutdown: Shutdown) -> Self {
        debug!("Fetcher::new: called");
        Self {
            source,
            governor,
            shutdown,
        }
    }

    /// Complete history for a key, following continuation cursors lazily
    pub fn fetch_all(&self, key: RepoBranchKey) -> impl Stream<Item = Result<CommitRecord, FetchError>> + Send + '_ {
        debug!(%key, "fetch_all: called");
        stream::try_unfold(Cursor::Start, move |cursor| {
            let key = key.clone();
            async move {
                let request = match cursor {
                    Cursor::Start => PageRequest::first(key, None),
                    Cursor::Next(next) => PageRequest::next(key, next),
                    Cursor::Done => return Ok::<_, FetchError>(None),
                };
                let page = self.page(&request).await?;
                let cursor = match page.next {
                    Some(next) => Cursor::Next(next),
                    None => Cursor::Done,
                };
                Ok(Some((page.commits, cursor)))
            }
        })
        .map_ok(|commits| stream::iter(commits.into_iter().map(Ok)))
        .try_flatten()
    }

    /// The most recent page of commits at or after `since`
    pub async fn fetch_since(
        &self,
        key: &RepoBranchKey,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>, FetchError> {
        debug!(%key, ?since, "fetch_since: called");
        let page = self.page(&PageRequest::first(key.clone(), since)).await?;
        Ok(page.commits)
    }

    /// Repository metadata, with the same quota handling as commit pages
    pub async fn repository(&self, repository: &str) -> Result<RepoMetadata, FetchError> {
        debug!(%repository, "Fetcher::repository: called");
        loop {
            self.governor.gate(&self.shutdown).await?;
            match self.source.repository(repository).await {
                Err(FetchError::QuotaExceeded { reset_at }) => {
                    warn!(%repository, "Quota exceeded fetching repository metadata");
                    self.governor.wait_for_reset(reset_at, &self.shutdown).await?;
                }
                other => return other,
            }
        }
    }

    /// One page; a quota-exceeded response is waited out and the same request retried
    async fn page(&self, request: &PageRequest) -> Result<CommitPage, FetchError> {
        loop {
            self.governor.gate(&self.shutdown).await?;
            match self.source.list_commits(request).await {
                Err(FetchError::QuotaExceeded { reset_at }) => {
                    warn!(key = %request.key, "Quota exceeded fetching commits");
                    self.governor.wait_for_reset(reset_at, &self.shutdown).await?;
                }
                other => return other,
            }
        }
    }
}
