//! CommitLog data and its durable JSON file
//!
//! The file is rewritten whole on every persist: serialize to a temp file in
//! the same directory, fsync, then rename over the old file. A crash at any
//! point leaves either the old document or the new one, never a mix.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::messages::PersistError;
use crate::domain::RepoBranchKey;

/// Seen commit SHAs per key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLog {
    #[serde(default)]
    keys: BTreeMap<RepoBranchKey, BTreeSet<String>>,
}

/// What a single `insert` changed, so it can be undone
#[derive(Debug, Default)]
pub struct Insertion {
    created_key: bool,
    added: Vec<String>,
}

impl Insertion {
    /// True when the insert changed nothing
    pub fn is_noop(&self) -> bool {
        !self.created_key && self.added.is_empty()
    }

    pub fn added(&self) -> usize {
        self.added.len()
    }
}

impl CommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, key: &RepoBranchKey, sha: &str) -> bool {
        self.keys.get(key).is_some_and(|shas| shas.contains(sha))
    }

    /// Whether the key has ever been recorded (bootstrap completed)
    pub fn contains_key(&self, key: &RepoBranchKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn seen_count(&self, key: &RepoBranchKey) -> usize {
        self.keys.get(key).map(BTreeSet::len).unwrap_or(0)
    }

    /// Per-key seen counts, ordered by key
    pub fn summary(&self) -> Vec<(RepoBranchKey, usize)> {
        self.keys.iter().map(|(k, shas)| (k.clone(), shas.len())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Add SHAs to a key, creating the key even when `shas` is empty
    pub fn insert<I>(&mut self, key: &RepoBranchKey, shas: I) -> Insertion
    where
        I: IntoIterator<Item = String>,
    {
        let created_key = !self.keys.contains_key(key);
        let set = self.keys.entry(key.clone()).or_default();
        let added = shas.into_iter().filter(|sha| set.insert(sha.clone())).collect();
        Insertion { created_key, added }
    }

    /// Undo an insert whose persist failed
    pub fn rollback(&mut self, key: &RepoBranchKey, insertion: Insertion) {
        debug!(%key, added = insertion.added.len(), created_key = insertion.created_key, "rollback: called");
        if insertion.created_key {
            self.keys.remove(key);
            return;
        }
        if let Some(set) = self.keys.get_mut(key) {
            for sha in &insertion.added {
                set.remove(sha);
            }
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn io_error(path: &Path, source: io::Error) -> PersistError {
    PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a commit log without taking the lock or touching the filesystem
///
/// `Ok(None)` when the file does not exist yet.
pub fn inspect(path: &Path) -> Result<Option<CommitLog>, PersistError> {
    debug!(path = %path.display(), "inspect: called");
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    let log: CommitLog = serde_json::from_slice(&content)?;
    Ok(Some(log))
}

/// Read a commit log without taking the lock
///
/// Missing or unreadable files yield an empty log. An unreadable file is
/// copied to `<path>.corrupt` first so its contents survive the next save.
pub fn load(path: &Path) -> CommitLog {
    debug!(path = %path.display(), "load: called");
    match inspect(path) {
        Ok(Some(log)) => {
            debug!(keys = log.keys.len(), "load: parsed commit log");
            log
        }
        Ok(None) => {
            info!(path = %path.display(), "No commit log yet, starting empty");
            CommitLog::new()
        }
        Err(e) => {
            let backup = sibling_path(path, ".corrupt");
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Commit log is unreadable, starting empty"
            );
            if let Err(e) = fs::copy(path, &backup) {
                warn!(error = %e, "Failed to back up unreadable commit log");
            }
            CommitLog::new()
        }
    }
}

/// The locked, writable commit log file
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    _lock: File,
}

impl LogFile {
    /// Open the log location and take an exclusive lock on `<path>.lock`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "LogFile::open: called");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let lock_path = sibling_path(&path, ".lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_error(&lock_path, e))?;
        lock.try_lock_exclusive()
            .map_err(|_| PersistError::Locked(path.clone()))?;

        Ok(Self { path, _lock: lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> CommitLog {
        load(&self.path)
    }

    /// Atomically replace the file with `log`
    pub fn save(&self, log: &CommitLog) -> Result<(), PersistError> {
        debug!(path = %self.path.display(), keys = log.keys.len(), "LogFile::save: called");
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tmp = NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, log)?;
            writer.flush().map_err(|e| io_error(tmp.path(), e))?;
        }
        tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&self.path).map_err(|e| io_error(&self.path, e.error))?;

        sync_dir(&dir);
        Ok(())
    }
}

/// Make a rename in `dir` durable
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(error = %e, "sync_dir: directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
