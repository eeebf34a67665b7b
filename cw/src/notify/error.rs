//! Notifier error types

use thiserror::Error;

/// Errors that can occur delivering a notification
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
