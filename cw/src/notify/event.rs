//! CommitEvent - what a notifier receives

use crate::domain::CommitRecord;

/// One new commit on a watched key, decorated with repository metadata
#[derive(Debug, Clone)]
pub struct CommitEvent {
    /// `owner/name`
    pub repository: String,
    pub branch: String,

    /// Short repository name shown as the message author
    pub display_name: String,
    pub owner_avatar_url: Option<String>,
    pub repository_url: String,

    pub commit: CommitRecord,

    /// The branch is the repository's default branch
    pub is_default_branch: bool,

    /// Another watched key shares this repository's short name
    pub is_duplicate_repo_name: bool,
}

impl CommitEvent {
    /// Whether a notifier should call out the branch next to the repository
    pub fn needs_branch_label(&self) -> bool {
        !self.is_default_branch || self.is_duplicate_repo_name
    }
}
