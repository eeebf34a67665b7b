//! Remote source error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur talking to the remote commit source
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request quota exhausted; the fetcher waits this out and retries
    #[error("Quota exceeded, resets at {reset_at}")]
    QuotaExceeded { reset_at: DateTime<Utc> },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Shutdown was requested while waiting for the quota to reset
    #[error("Cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Check if this is a quota error
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, FetchError::QuotaExceeded { .. })
    }

    /// Get the reset time if this is a quota error
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FetchError::QuotaExceeded { reset_at } => Some(*reset_at),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quota_exceeded() {
        let reset_at = Utc::now();
        let err = FetchError::QuotaExceeded { reset_at };
        assert!(err.is_quota_exceeded());
        assert_eq!(err.reset_at(), Some(reset_at));

        let err = FetchError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert!(!err.is_quota_exceeded());
        assert_eq!(err.reset_at(), None);
    }

    #[test]
    fn test_display() {
        let err = FetchError::Api {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "API error 502: Bad gateway");
        assert!(FetchError::Cancelled.is_cancelled());
    }
}
