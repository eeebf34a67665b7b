//! Repository metadata resolved once at startup

use serde::{Deserialize, Serialize};

/// Repository facts needed to resolve keys and decorate notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// `owner/name` as reported by the source
    pub full_name: String,

    /// Short display name (usually the bare repository name)
    pub display_name: String,

    /// Branch used when a configured entry names none
    pub default_branch: String,

    /// Avatar of the owning user or organization
    pub owner_avatar_url: Option<String>,

    /// Web page for the repository
    pub html_url: String,
}
