//! CommitRecord - one fetched commit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Split a commit message into a one-line summary and an optional body
///
/// Splits at the first blank line if there is one, otherwise at the first
/// newline. A body that is empty after trimming is treated as absent.
pub fn split_message(message: &str) -> (&str, Option<&str>) {
    let split = message
        .split_once("\n\n")
        .or_else(|| message.split_once("\r\n\r\n"))
        .or_else(|| message.split_once('\n'));

    match split {
        Some((summary, body)) => {
            let body = body.trim();
            let body = if body.is_empty() { None } else { Some(body) };
            (summary.trim_end(), body)
        }
        None => (message.trim_end(), None),
    }
}

/// A commit as fetched from the remote source. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Commit SHA (opaque id)
    pub sha: String,

    /// Committer timestamp
    pub committed_at: DateTime<Utc>,

    /// Full commit message
    pub message: String,

    /// Author name as shown to humans
    pub author_display_name: String,

    /// Author avatar URL, when the author is linked to an account
    pub author_avatar_ref: Option<String>,

    /// Web page for the commit
    pub html_url: String,
}

impl CommitRecord {
    /// First line of the message
    pub fn summary(&self) -> &str {
        split_message(&self.message).0
    }

    /// Remainder of the message after the summary, if any
    pub fn body(&self) -> Option<&str> {
        split_message(&self.message).1
    }

    /// Abbreviated SHA (7 chars)
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}
