//! Notification sinks
//!
//! Delivers new-commit events. Discord when a webhook URL is configured,
//! the log otherwise.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

mod discord;
mod error;
mod event;
mod log;
pub mod notifier;

pub use discord::DiscordNotifier;
pub use error::DeliveryError;
pub use event::CommitEvent;
pub use log::LogNotifier;
pub use notifier::Notifier;

use crate::config::NotifyConfig;

/// Create the notifier the configuration asks for
pub fn create_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>, DeliveryError> {
    debug!(webhook_url_env = %config.webhook_url_env, "create_notifier: called");
    match config.get_webhook_url() {
        Some(url) => {
            info!("Delivering notifications to Discord");
            Ok(Arc::new(DiscordNotifier::new(url, Duration::from_millis(config.timeout_ms))?))
        }
        None => {
            info!(
                webhook_url_env = %config.webhook_url_env,
                "No webhook URL set, logging notifications instead"
            );
            Ok(Arc::new(LogNotifier))
        }
    }
}
