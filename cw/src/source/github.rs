//! GitHub REST API commit source
//!
//! Endpoints used:
//! - `GET /repos/{repo}` for metadata
//! - `GET /repos/{repo}/commits?sha=&since=&per_page=` paginated by `Link`
//! - `GET /rate_limit` for quota (does not count against the quota)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CommitPage, CommitSource, FetchError, PageRequest};
use crate::config::GithubConfig;
use crate::domain::{CommitRecord, RepoMetadata};
use crate::governor::RateBudget;

const API_VERSION: &str = "2022-11-28";

/// Extract the `rel="next"` URL from a `Link` header
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let url = pieces.next()?.trim();
        let is_next = pieces.any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        url.strip_prefix('<')?.strip_suffix('>').map(str::to_string)
    })
}

/// Detect an exhausted quota from a 403/429 response's headers
fn quota_reset(status: StatusCode, headers: &HeaderMap) -> Option<DateTime<Utc>> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if header("x-ratelimit-remaining") == Some("0") {
        let reset = header("x-ratelimit-reset")
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(60));
        return Some(reset);
    }

    // Secondary rate limits only send retry-after
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

/// GitHub API client
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
    per_page: u32,
    user_agent: String,
    http: Client,
}

impl GitHubClient {
    /// Create a new client from configuration
    ///
    /// The token is optional; without it GitHub allows 60 requests per hour.
    pub fn from_config(config: &GithubConfig) -> Result<Self, FetchError> {
        debug!(base_url = %config.base_url, per_page = config.per_page, "from_config: called");
        let token = config.get_token();
        if token.is_none() {
            warn!(
                token_env = %config.token_env,
                "No GitHub token set, requests are limited to the anonymous quota"
            );
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            per_page: config.per_page,
            user_agent: config.user_agent.clone(),
            http,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and map non-success statuses to errors
    async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if let Some(reset_at) = quota_reset(status, response.headers()) {
            debug!(%status, %reset_at, "send: quota exceeded");
            return Err(FetchError::QuotaExceeded { reset_at });
        }

        let message = response.text().await.unwrap_or_default();
        debug!(%status, "send: API error");
        Err(FetchError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CommitSource for GitHubClient {
    async fn repository(&self, repository: &str) -> Result<RepoMetadata, FetchError> {
        debug!(%repository, "repository: called");
        let url = format!("{}/repos/{}", self.base_url, repository);
        let repo: ApiRepository = self.send(self.get(&url)).await?.json().await?;
        Ok(repo.into())
    }

    async fn list_commits(&self, request: &PageRequest) -> Result<CommitPage, FetchError> {
        debug!(key = %request.key, since = ?request.since, cursor = ?request.cursor, "list_commits: called");
        let builder = match &request.cursor {
            Some(cursor) => self.get(cursor),
            None => {
                let url = format!("{}/repos/{}/commits", self.base_url, request.key.repository());
                let mut query = vec![
                    ("sha", request.key.branch().to_string()),
                    ("per_page", self.per_page.to_string()),
                ];
                if let Some(since) = request.since {
                    query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
                }
                self.get(&url).query(&query)
            }
        };

        let response = match self.send(builder).await {
            Ok(response) => response,
            // 409 is GitHub's answer for a repository with no commits
            Err(FetchError::Api { status: 409, .. }) => {
                debug!(key = %request.key, "list_commits: empty repository");
                return Ok(CommitPage::default());
            }
            Err(e) => return Err(e),
        };

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);

        let commits: Vec<ApiCommit> = response.json().await?;
        let commits = commits
            .into_iter()
            .map(CommitRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = commits.len(), has_next = next.is_some(), "list_commits: page received");
        Ok(CommitPage { commits, next })
    }

    async fn quota(&self) -> Result<RateBudget, FetchError> {
        debug!("quota: called");
        let url = format!("{}/rate_limit", self.base_url);
        let limits: ApiRateLimit = self.send(self.get(&url)).await?.json().await?;
        let core = limits.resources.core;
        let reset_at = DateTime::from_timestamp(core.reset, 0)
            .ok_or_else(|| FetchError::InvalidResponse(format!("Bad reset timestamp: {}", core.reset)))?;

        Ok(RateBudget {
            limit: core.limit,
            remaining_requests: core.remaining,
            reset_at,
        })
    }
}

// GitHub API response types

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    full_name: String,
    default_branch: String,
    html_url: String,
    owner: ApiUser,
}

impl From<ApiRepository> for RepoMetadata {
    fn from(repo: ApiRepository) -> Self {
        Self {
            full_name: repo.full_name,
            display_name: repo.name,
            default_branch: repo.default_branch,
            owner_avatar_url: repo.owner.avatar_url,
            html_url: repo.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiSignature>,
    committer: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    html_url: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

impl TryFrom<ApiCommit> for CommitRecord {
    type Error = FetchError;

    fn try_from(api: ApiCommit) -> Result<Self, Self::Error> {
        let committed_at = api
            .commit
            .committer
            .as_ref()
            .and_then(|c| c.date)
            .or_else(|| api.commit.author.as_ref().and_then(|a| a.date))
            .ok_or_else(|| FetchError::InvalidResponse(format!("Commit {} has no date", api.sha)))?;

        let author_display_name = api
            .commit
            .author
            .and_then(|a| a.name)
            .or_else(|| api.author.as_ref().map(|u| u.login.clone()))
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            sha: api.sha,
            committed_at,
            message: api.commit.message,
            author_display_name,
            author_avatar_ref: api.author.and_then(|u| u.avatar_url),
            html_url: api.html_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiRate {
    limit: u32,
    remaining: u32,
    reset: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResources {
    core: ApiRate,
}

#[derive(Debug, Deserialize)]
struct ApiRateLimit {
    resources: ApiResources,
}
