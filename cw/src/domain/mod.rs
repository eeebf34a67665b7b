//! Domain types for commitwatch
//!
//! Core domain types: RepoBranchKey, RepoSpec, CommitRecord, RepoMetadata.
//! Everything downstream of configuration is keyed by a resolved
//! `RepoBranchKey`; an unresolved `RepoSpec` only exists until startup.

mod commit;
mod key;
mod metadata;

pub use commit::{CommitRecord, split_message};
pub use key::{KeyParseError, RepoBranchKey, RepoSpec};
pub use metadata::RepoMetadata;
