//! Commit log store messages
//!
//! Commands and responses for the store actor.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::RepoBranchKey;

/// Errors from commit log operations
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Commit log {0} is locked by another process")]
    Locked(PathBuf),

    #[error("Store channel closed")]
    ChannelClosed,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, PersistError>;

/// Commands sent to the store actor
#[derive(Debug)]
pub enum StoreCommand {
    HasSeen {
        key: RepoBranchKey,
        sha: String,
        reply: oneshot::Sender<bool>,
    },
    ContainsKey {
        key: RepoBranchKey,
        reply: oneshot::Sender<bool>,
    },
    MarkSeen {
        key: RepoBranchKey,
        shas: Vec<String>,
        reply: oneshot::Sender<StoreResponse<usize>>,
    },
    SeenCount {
        key: RepoBranchKey,
        reply: oneshot::Sender<usize>,
    },
    Summary {
        reply: oneshot::Sender<Vec<(RepoBranchKey, usize)>>,
    },

    // Shutdown; replied to once the file lock is released
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
