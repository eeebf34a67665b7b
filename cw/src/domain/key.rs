//! Watched target identity
//!
//! Textual forms:
//! - `RepoSpec`: `owner/repo` or `owner/repo:branch` (as written in config)
//! - `RepoBranchKey`: always `owner/repo:branch` (after resolution)
//!
//! Git forbids `:` in ref names, so the first `:` always separates the branch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::RepoMetadata;

/// Errors parsing a repository entry or key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Empty repository entry")]
    Empty,

    #[error("Repository '{0}' must be in owner/name form")]
    NotOwnerName(String),

    #[error("Empty branch in '{0}'")]
    EmptyBranch(String),

    #[error("Key '{0}' has no branch")]
    MissingBranch(String),
}

fn parse_repository(raw: &str, entry: &str) -> Result<String, KeyParseError> {
    let mut parts = raw.split('/');
    let owner = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    if owner.is_empty() || name.is_empty() || parts.next().is_some() {
        debug!(%entry, "parse_repository: not owner/name");
        return Err(KeyParseError::NotOwnerName(entry.to_string()));
    }
    Ok(raw.to_string())
}

/// A configured repository entry; the branch is optional until resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSpec {
    /// Repository in `owner/name` form
    pub repository: String,

    /// Explicit branch, or None to use the repository's default branch
    pub branch: Option<String>,
}

impl RepoSpec {
    /// Resolve into a key against the repository's metadata
    ///
    /// The key uses the canonical `full_name`, since owner and repository
    /// names are case-insensitive and `Acme/Widgets` is `acme/widgets`.
    pub fn resolve(&self, meta: &RepoMetadata) -> RepoBranchKey {
        let branch = self.branch.clone().unwrap_or_else(|| meta.default_branch.clone());
        RepoBranchKey::new(meta.full_name.clone(), branch)
    }
}

impl FromStr for RepoSpec {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = s.trim();
        if entry.is_empty() {
            return Err(KeyParseError::Empty);
        }

        match entry.split_once(':') {
            Some((repo, branch)) => {
                let branch = branch.trim();
                if branch.is_empty() {
                    return Err(KeyParseError::EmptyBranch(entry.to_string()));
                }
                Ok(Self {
                    repository: parse_repository(repo.trim(), entry)?,
                    branch: Some(branch.to_string()),
                })
            }
            None => Ok(Self {
                repository: parse_repository(entry, entry)?,
                branch: None,
            }),
        }
    }
}

impl fmt::Display for RepoSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{}:{}", self.repository, branch),
            None => write!(f, "{}", self.repository),
        }
    }
}

/// Identity of one watched repository+branch pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoBranchKey {
    repository: String,
    branch: String,
}

impl RepoBranchKey {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }

    /// Repository in `owner/name` form
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Repository name without the owner
    pub fn repo_name(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.repository)
    }
}

impl FromStr for RepoBranchKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec: RepoSpec = s.parse()?;
        match spec.branch {
            Some(branch) => Ok(Self::new(spec.repository, branch)),
            None => Err(KeyParseError::MissingBranch(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoBranchKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoBranchKey> for String {
    fn from(key: RepoBranchKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for RepoBranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::metadata;

    #[test]
    fn test_parse_spec_without_branch() {
        let spec: RepoSpec = "acme/widgets".parse().unwrap();
        assert_eq!(spec.repository, "acme/widgets");
        assert_eq!(spec.branch, None);
    }

    #[test]
    fn test_parse_spec_with_branch() {
        let spec: RepoSpec = " acme/widgets:release/1.x ".parse().unwrap();
        assert_eq!(spec.repository, "acme/widgets");
        assert_eq!(spec.branch.as_deref(), Some("release/1.x"));
        assert_eq!(spec.to_string(), "acme/widgets:release/1.x");
    }

    #[test]
    fn test_parse_spec_errors() {
        assert_eq!("".parse::<RepoSpec>(), Err(KeyParseError::Empty));
        assert!(matches!(
            "widgets".parse::<RepoSpec>(),
            Err(KeyParseError::NotOwnerName(_))
        ));
        assert!(matches!(
            "acme/widgets/extra".parse::<RepoSpec>(),
            Err(KeyParseError::NotOwnerName(_))
        ));
        assert!(matches!(
            "acme/widgets:".parse::<RepoSpec>(),
            Err(KeyParseError::EmptyBranch(_))
        ));
    }

    #[test]
    fn test_resolve_uses_default_branch_only_when_absent() {
        let meta = metadata("acme/widgets", "main");
        let spec: RepoSpec = "acme/widgets".parse().unwrap();
        assert_eq!(spec.resolve(&meta), RepoBranchKey::new("acme/widgets", "main"));

        let spec: RepoSpec = "acme/widgets:dev".parse().unwrap();
        assert_eq!(spec.resolve(&meta), RepoBranchKey::new("acme/widgets", "dev"));
    }

    #[test]
    fn test_resolve_uses_canonical_name() {
        let spec: RepoSpec = "Acme/Widgets:dev".parse().unwrap();
        let key = spec.resolve(&metadata("acme/widgets", "main"));
        assert_eq!(key, RepoBranchKey::new("acme/widgets", "dev"));
    }

    #[test]
    fn test_key_requires_branch() {
        assert!(matches!(
            "acme/widgets".parse::<RepoBranchKey>(),
            Err(KeyParseError::MissingBranch(_))
        ));
        let key: RepoBranchKey = "acme/widgets:main".parse().unwrap();
        assert_eq!(key.repository(), "acme/widgets");
        assert_eq!(key.branch(), "main");
        assert_eq!(key.repo_name(), "widgets");
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = RepoBranchKey::new("acme/widgets", "main");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"acme/widgets:main\"");

        let back: RepoBranchKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
