//! CommitLogStore - actor that owns the commit log
//!
//! Every read and every append goes through one task, so the
//! load-mutate-save cycle on the shared JSON document is serialized no matter
//! how many pollers call in concurrently.

use std::path::Path;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::log::{CommitLog, LogFile};
use super::messages::{PersistError, StoreCommand, StoreResponse};
use crate::domain::RepoBranchKey;

/// Handle to send commands to the store actor
#[derive(Clone)]
pub struct CommitLogStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl CommitLogStore {
    /// Lock and load the log at `path`, then spawn the actor
    pub fn spawn(path: impl AsRef<Path>) -> StoreResponse<Self> {
        debug!(path = %path.as_ref().display(), "CommitLogStore::spawn: called");
        let file = LogFile::open(path)?;
        let log = file.load();
        info!(
            path = %file.path().display(),
            keys = log.summary().len(),
            "Commit log loaded"
        );

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(file, log, rx));

        Ok(Self { tx })
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| PersistError::ChannelClosed)?;
        reply_rx.await.map_err(|_| PersistError::ChannelClosed)
    }

    pub async fn has_seen(&self, key: &RepoBranchKey, sha: &str) -> StoreResponse<bool> {
        debug!(%key, %sha, "has_seen: called");
        self.request(|reply| StoreCommand::HasSeen {
            key: key.clone(),
            sha: sha.to_string(),
            reply,
        })
        .await
    }

    /// Whether bootstrap has completed for `key`
    pub async fn contains_key(&self, key: &RepoBranchKey) -> StoreResponse<bool> {
        debug!(%key, "contains_key: called");
        self.request(|reply| StoreCommand::ContainsKey { key: key.clone(), reply })
            .await
    }

    /// Append SHAs to the key's set and persist before returning
    ///
    /// Idempotent: already-seen SHAs are ignored. Returns how many SHAs were
    /// new. On error nothing from this call is visible, in memory or on disk.
    pub async fn mark_seen_and_persist(&self, key: &RepoBranchKey, shas: Vec<String>) -> StoreResponse<usize> {
        debug!(%key, count = shas.len(), "mark_seen_and_persist: called");
        self.request(|reply| StoreCommand::MarkSeen {
            key: key.clone(),
            shas,
            reply,
        })
        .await?
    }

    pub async fn seen_count(&self, key: &RepoBranchKey) -> StoreResponse<usize> {
        debug!(%key, "seen_count: called");
        self.request(|reply| StoreCommand::SeenCount { key: key.clone(), reply })
            .await
    }

    /// Seen counts for every recorded key
    pub async fn summary(&self) -> StoreResponse<Vec<(RepoBranchKey, usize)>> {
        debug!("summary: called");
        self.request(|reply| StoreCommand::Summary { reply }).await
    }

    /// Stop the actor and release the file lock
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        self.request(|reply| StoreCommand::Shutdown { reply }).await
    }
}

fn apply_mark(file: &LogFile, log: &mut CommitLog, key: &RepoBranchKey, shas: Vec<String>) -> StoreResponse<usize> {
    let insertion = log.insert(key, shas);
    if insertion.is_noop() {
        debug!(%key, "apply_mark: nothing new, skipping write");
        return Ok(0);
    }

    let added = insertion.added();
    match file.save(log) {
        Ok(()) => {
            debug!(%key, added, "apply_mark: persisted");
            Ok(added)
        }
        Err(e) => {
            error!(%key, error = %e, "Failed to persist commit log, rolling back");
            log.rollback(key, insertion);
            Err(e)
        }
    }
}

async fn actor_loop(file: LogFile, mut log: CommitLog, mut rx: mpsc::Receiver<StoreCommand>) {
    debug!("actor_loop: called");
    let mut shutdown_reply = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::HasSeen { key, sha, reply } => {
                let _ = reply.send(log.has_seen(&key, &sha));
            }

            StoreCommand::ContainsKey { key, reply } => {
                let _ = reply.send(log.contains_key(&key));
            }

            StoreCommand::MarkSeen { key, shas, reply } => {
                debug!(%key, count = shas.len(), "actor_loop: MarkSeen command");
                let _ = reply.send(apply_mark(&file, &mut log, &key, shas));
            }

            StoreCommand::SeenCount { key, reply } => {
                let _ = reply.send(log.seen_count(&key));
            }

            StoreCommand::Summary { reply } => {
                let _ = reply.send(log.summary());
            }

            StoreCommand::Shutdown { reply } => {
                debug!("actor_loop: Shutdown command");
                shutdown_reply = Some(reply);
                break;
            }
        }
    }

    drop(file);
    info!("Commit log store stopped");
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}
