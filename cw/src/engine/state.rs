//! Per-key engine state
//!
//! `EngineState` is owned by the scheduler. A key's `TargetState` is moved
//! out while a task works on it and moved back when the task finishes, so a
//! key whose state is absent is in flight and cannot be dispatched again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{CommitRecord, RepoBranchKey, RepoMetadata};
use crate::notify::CommitEvent;

/// A resolved watch target and the facts needed to describe its commits
#[derive(Debug, Clone)]
pub struct Target {
    pub key: RepoBranchKey,
    pub metadata: RepoMetadata,
    pub is_default_branch: bool,
    pub is_duplicate_repo_name: bool,
}

impl Target {
    pub fn event(&self, commit: CommitRecord) -> CommitEvent {
        CommitEvent {
            repository: self.key.repository().to_string(),
            branch: self.key.branch().to_string(),
            display_name: self.metadata.display_name.clone(),
            owner_avatar_url: self.metadata.owner_avatar_url.clone(),
            repository_url: self.metadata.html_url.clone(),
            commit,
            is_default_branch: self.is_default_branch,
            is_duplicate_repo_name: self.is_duplicate_repo_name,
        }
    }
}

/// Bootstrap lifecycle of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    /// Not in the commit log yet
    Unseen,
    /// Full history is being recorded
    Initializing,
    /// Polled incrementally
    Ready,
}

impl fmt::Display for KeyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyPhase::Unseen => "unseen",
            KeyPhase::Initializing => "initializing",
            KeyPhase::Ready => "ready",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct TargetState {
    pub target: Arc<Target>,
    pub phase: KeyPhase,

    /// Timestamp of the last processed commit; in memory only
    pub watermark: Option<DateTime<Utc>>,
}

impl TargetState {
    pub fn new(target: Target, phase: KeyPhase) -> Self {
        Self {
            target: Arc::new(target),
            phase,
            watermark: None,
        }
    }

    pub fn key(&self) -> &RepoBranchKey {
        &self.target.key
    }
}

/// Every watched key, in configuration order
#[derive(Debug, Default)]
pub struct EngineState {
    keys: Vec<RepoBranchKey>,
    idle: HashMap<RepoBranchKey, TargetState>,
}

impl EngineState {
    /// Build from already-deduplicated targets
    pub fn new(targets: Vec<TargetState>) -> Self {
        let keys = targets.iter().map(|t| t.key().clone()).collect();
        let idle = targets.into_iter().map(|t| (t.key().clone(), t)).collect();
        Self { keys, idle }
    }

    pub fn keys(&self) -> &[RepoBranchKey] {
        &self.keys
    }

    /// Number of watched keys, in flight or not
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// State of an idle key; None while the key is in flight
    pub fn get(&self, key: &RepoBranchKey) -> Option<&TargetState> {
        self.idle.get(key)
    }

    /// Move a key's state out for a task to work on
    pub fn take(&mut self, key: &RepoBranchKey) -> Option<TargetState> {
        self.idle.remove(key)
    }

    /// Return a key's state after its task finished
    pub fn restore(&mut self, state: TargetState) {
        self.idle.insert(state.key().clone(), state);
    }

    pub fn is_idle(&self, key: &RepoBranchKey) -> bool {
        self.idle.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.keys.len() - self.idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::metadata;

    fn target_state(repo: &str, branch: &str) -> TargetState {
        let target = Target {
            key: RepoBranchKey::new(repo, branch),
            metadata: metadata(repo, "main"),
            is_default_branch: branch == "main",
            is_duplicate_repo_name: false,
        };
        TargetState::new(target, KeyPhase::Unseen)
    }

    #[test]
    fn test_take_and_restore() {
        let mut state = EngineState::new(vec![target_state("acme/a", "main"), target_state("acme/b", "main")]);
        let key = RepoBranchKey::new("acme/a", "main");

        let taken = state.take(&key).unwrap();
        assert!(!state.is_idle(&key));
        assert!(state.take(&key).is_none());
        assert_eq!(state.len(), 2);
        assert_eq!(state.in_flight_count(), 1);

        state.restore(taken);
        assert!(state.is_idle(&key));
        assert_eq!(state.in_flight_count(), 0);
    }

    #[test]
    fn test_keys_keep_configuration_order() {
        let state = EngineState::new(vec![target_state("acme/z", "main"), target_state("acme/a", "dev")]);
        let keys: Vec<String> = state.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["acme/z:main", "acme/a:dev"]);
    }

    #[test]
    fn test_event_carries_labels() {
        let ts = target_state("acme/widgets", "dev");
        let event = ts.target.event(crate::source::mock::commit("abc", 1));
        assert_eq!(event.repository, "acme/widgets");
        assert_eq!(event.branch, "dev");
        assert!(!event.is_default_branch);
        assert!(event.needs_branch_label());
    }
}
