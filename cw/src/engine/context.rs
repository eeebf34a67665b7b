//! Engine - the shared services every key's work runs against

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::error::ConfigError;
use super::state::{EngineState, KeyPhase, Target, TargetState};
use crate::domain::{RepoBranchKey, RepoMetadata, RepoSpec};
use crate::fetcher::Fetcher;
use crate::governor::Governor;
use crate::notify::Notifier;
use crate::store::CommitLogStore;

/// Fetcher, governor, commit log and notifier, shared by all key tasks
pub struct Engine {
    pub(super) fetcher: Fetcher,
    pub(super) governor: Arc<Governor>,
    pub(super) store: CommitLogStore,
    pub(super) notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(fetcher: Fetcher, governor: Arc<Governor>, store: CommitLogStore, notifier: Arc<dyn Notifier>) -> Self {
        debug!("Engine::new: called");
        Self {
            fetcher,
            governor,
            store,
            notifier,
        }
    }

    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    pub fn store(&self) -> &CommitLogStore {
        &self.store
    }

    /// Resolve configured entries into watched keys
    ///
    /// Fetches each repository's metadata once, fills in the default branch
    /// where none was given, and rejects entries that resolve to the same
    /// canonical key. Keys already in the commit log start ready; the rest start unseen.
    pub async fn configure(&self, specs: &[RepoSpec]) -> Result<EngineState, ConfigError> {
        debug!(count = specs.len(), "configure: called");
        if specs.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let mut metadata: HashMap<String, RepoMetadata> = HashMap::new();
        let mut seen: HashSet<RepoBranchKey> = HashSet::new();
        let mut resolved = Vec::with_capacity(specs.len());

        for spec in specs {
            let lookup = spec.repository.to_lowercase();
            let meta = match metadata.get(&lookup) {
                Some(meta) => meta.clone(),
                None => {
                    let meta =
                        self.fetcher
                            .repository(&spec.repository)
                            .await
                            .map_err(|source| ConfigError::Metadata {
                                repository: spec.repository.clone(),
                                source,
                            })?;
                    metadata.insert(lookup, meta.clone());
                    meta
                }
            };

            let key = spec.resolve(&meta);
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Duplicate(key));
            }
            debug!(%spec, %key, "configure: resolved");
            resolved.push((key, meta));
        }

        let mut name_counts: HashMap<String, usize> = HashMap::new();
        for (key, _) in &resolved {
            *name_counts.entry(key.repo_name().to_lowercase()).or_default() += 1;
        }

        let mut targets = Vec::with_capacity(resolved.len());
        for (key, meta) in resolved {
            let phase = if self.store.contains_key(&key).await? {
                KeyPhase::Ready
            } else {
                KeyPhase::Unseen
            };
            let target = Target {
                is_default_branch: key.branch() == meta.default_branch,
                is_duplicate_repo_name: name_counts.get(&key.repo_name().to_lowercase()).copied().unwrap_or(0) > 1,
                key,
                metadata: meta,
            };
            info!(key = %target.key, %phase, "Watching");
            targets.push(TargetState::new(target, phase));
        }

        Ok(EngineState::new(targets))
    }
}
