//! Slack webhook message sink.
//!
//! An incoming webhook can only post, never edit or remove earlier posts.
//! The sink therefore remembers, per id and channel, what it has posted and
//! until when it is live: an `UpdateOnly` message is posted only where the
//! id is live, and an `Insert` repeating the live text is not posted again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{Delivery, MessageSink};
use crate::error::ChannelError;
use crate::message::{PodMessage, PostMode};

/// Retry delay assumed when a 429 carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Message id and destination channel of one post.
type PostKey = (String, Option<String>);

#[derive(Debug, Clone)]
struct Posted {
    text: String,
    expires_at: DateTime<Utc>,
}

/// Slack webhook message sink.
pub struct SlackChannel {
    webhook_url: String,
    client: reqwest::Client,
    posted: Mutex<HashMap<PostKey, Posted>>,
}

impl SlackChannel {
    /// Create a Slack channel with a specific webhook URL.
    ///
    /// An empty URL yields a disabled sink.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            client: reqwest::Client::new(),
            posted: Mutex::new(HashMap::new()),
        }
    }

    /// Text of the live post for `key` at `now`, if any.
    ///
    /// Every entry that has expired by `now` is dropped on the way.
    fn live_text(&self, key: &PostKey, now: DateTime<Utc>) -> Option<String> {
        let mut posted = self.posted.lock().ok()?;
        posted.retain(|_, entry| entry.expires_at > now);
        posted.get(key).map(|entry| entry.text.clone())
    }

    fn remember(&self, key: PostKey, message: &PodMessage) {
        if let Ok(mut posted) = self.posted.lock() {
            posted.insert(
                key,
                Posted {
                    text: message.text.clone(),
                    expires_at: message.expires_at(),
                },
            );
        }
    }

    /// Number of posts currently remembered, one per id and channel.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.posted.lock().map(|posted| posted.len()).unwrap_or(0)
    }

    /// Format a message as one webhook payload per destination channel.
    fn format_payloads(message: &PodMessage) -> Vec<SlackPayload> {
        let attachment = SlackAttachment {
            fallback: message.text.clone(),
            color: message.severity.color().to_string(),
            text: message.text.clone(),
            footer: Some(format!(
                "{} | {}",
                message.severity.as_str(),
                message.id
            )),
            ts: Some(message.timestamp.timestamp()),
        };

        let channels: Vec<Option<String>> = if message.destination.channels.is_empty() {
            vec![None]
        } else {
            message
                .destination
                .channels
                .iter()
                .map(|c| Some(format!("#{}", c.trim_start_matches('#'))))
                .collect()
        };

        channels
            .into_iter()
            .map(|channel| SlackPayload {
                channel,
                attachments: vec![attachment.clone()],
            })
            .collect()
    }

    async fn post(&self, payload: &SlackPayload) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(self.webhook_url.as_str())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(channel = "slack", retry_after_secs, "Slack webhook rate limited");
            return Err(ChannelError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            channel = "slack",
            status = %status,
            body = %body,
            "Slack webhook request failed"
        );
        Err(ChannelError::Other(format!("Slack returned {status}: {body}")))
    }
}

#[async_trait]
impl MessageSink for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    /// Post to every destination channel that needs it.
    ///
    /// A failing channel does not stop the others; the first failure is
    /// returned once all channels were tried.
    async fn send(&self, message: &PodMessage) -> Result<Delivery, ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::NotConfigured("Slack webhook URL".to_string()));
        }

        let mut delivery = Delivery::Skipped;
        let mut failure = None;

        for payload in Self::format_payloads(message) {
            let key = (message.id.clone(), payload.channel.clone());
            match (message.post, self.live_text(&key, message.timestamp)) {
                (PostMode::UpdateOnly, None) => {
                    debug!(channel = "slack", id = %message.id, to = ?payload.channel, "No live message to update");
                    continue;
                }
                (_, Some(text)) if text == message.text => {
                    debug!(channel = "slack", id = %message.id, to = ?payload.channel, "Message unchanged");
                    continue;
                }
                _ => {}
            }

            debug!(channel = "slack", id = %message.id, to = ?payload.channel, post = ?message.post, "Sending message");
            match self.post(&payload).await {
                Ok(()) => {
                    self.remember(key, message);
                    delivery = Delivery::Posted;
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(delivery),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ChannelError> {
        if let Ok(mut posted) = self.posted.lock() {
            posted.retain(|(posted_id, _), _| posted_id != id);
        }
        debug!(channel = "slack", id, "Forgot message");
        Ok(())
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Clone, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Destination;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_payload_per_channel() {
        let message = PodMessage::alert(
            "cfg:k8s:ns:p:20200319",
            "Pod ns/p is broken",
            Destination::channels(vec!["alerts".into(), "#ops".into()]),
        );
        let payloads = SlackChannel::format_payloads(&message);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].channel.as_deref(), Some("#alerts"));
        assert_eq!(payloads[1].channel.as_deref(), Some("#ops"));
        assert_eq!(payloads[0].attachments[0].color, "#f39c12");
        assert_eq!(
            payloads[0].attachments[0].footer.as_deref(),
            Some("Warning | cfg:k8s:ns:p:20200319")
        );
    }

    #[test]
    fn test_payload_without_channels() {
        let message = PodMessage::alert("id", "text", Destination::default());
        let payloads = SlackChannel::format_payloads(&message);
        assert_eq!(payloads.len(), 1);
        let value = serde_json::to_value(&payloads[0]).unwrap();
        assert!(value.get("channel").is_none());
    }

    #[test]
    fn test_expired_posts_are_pruned() {
        let sink = SlackChannel::new("http://localhost/hook");
        let day_one = Utc.with_ymd_and_hms(2020, 3, 19, 0, 0, 0).unwrap();
        for id in ["cfg:a:20200319", "cfg:b:20200319"] {
            let message = PodMessage::alert(id, "broken", Destination::default())
                .with_timestamp(day_one)
                .with_ttl(Duration::from_secs(3600));
            sink.remember((id.to_string(), None), &message);
        }
        assert_eq!(sink.tracked(), 2);

        let day_two = day_one + chrono::Duration::days(1);
        let key = ("cfg:a:20200320".to_string(), None);
        assert_eq!(sink.live_text(&key, day_two), None);
        assert_eq!(sink.tracked(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let sink = SlackChannel::new("");
        assert!(!sink.enabled());
        let message = PodMessage::alert("id", "text", Destination::default());
        assert!(matches!(
            sink.send(&message).await,
            Err(ChannelError::NotConfigured(_))
        ));
    }
}
