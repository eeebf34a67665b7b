//! Engine error types

use thiserror::Error;

use crate::domain::RepoBranchKey;
use crate::source::FetchError;
use crate::store::PersistError;

/// Errors resolving configured entries into watched keys; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No repositories configured")]
    NoRepositories,

    /// Two configured entries resolved to the same key
    #[error("Duplicate watch target: {0}")]
    Duplicate(RepoBranchKey),

    #[error("Failed to fetch metadata for {repository}: {source}")]
    Metadata {
        repository: String,
        #[source]
        source: FetchError,
    },

    #[error("Commit log unavailable: {0}")]
    Store(#[from] PersistError),
}

/// Errors that abort one key's cycle
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl PollError {
    /// Shutdown interrupted a quota wait
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Fetch(e) if e.is_cancelled())
    }
}
