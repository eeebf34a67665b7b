//! Discord webhook notifier

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{CommitEvent, DeliveryError, Notifier};

/// Discord rejects embed field values longer than this
const FIELD_VALUE_LIMIT: usize = 1024;

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    author: EmbedAuthor,
    title: String,
    url: String,
    timestamp: String,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn title(event: &CommitEvent) -> String {
    if event.needs_branch_label() {
        format!("New commit in {} [{}]", event.repository, event.branch)
    } else {
        format!("New commit in {}", event.repository)
    }
}

fn payload(event: &CommitEvent) -> WebhookPayload {
    let commit = &event.commit;

    let mut fields = vec![EmbedField {
        name: "Commit".to_string(),
        value: truncate(
            &format!("[`{}`]({}) {}", commit.short_sha(), commit.html_url, commit.summary()),
            FIELD_VALUE_LIMIT,
        ),
    }];
    if let Some(body) = commit.body() {
        fields.push(EmbedField {
            name: "Description".to_string(),
            value: truncate(body, FIELD_VALUE_LIMIT),
        });
    }

    WebhookPayload {
        embeds: vec![Embed {
            author: EmbedAuthor {
                name: event.display_name.clone(),
                icon_url: event.owner_avatar_url.clone(),
            },
            title: title(event),
            url: event.repository_url.clone(),
            timestamp: commit.committed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            fields,
        }],
    }
}

/// Posts one embed per commit to a Discord webhook
pub struct DiscordNotifier {
    webhook_url: String,
    http: Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        debug!(?timeout, "DiscordNotifier::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            http,
        })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, event: &CommitEvent) -> Result<(), DeliveryError> {
        debug!(repository = %event.repository, sha = %event.commit.sha, "DiscordNotifier::notify: called");
        info!(
            repository = %event.repository,
            branch = %event.branch,
            sha = %event.commit.sha,
            url = %event.commit.html_url,
            "Sending Discord notification: {}",
            event.commit.summary()
        );

        let response = self.http.post(&self.webhook_url).json(&payload(event)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
