//! Chat message dispatch for pod state alerts.
//!
//! This crate delivers [`PodMessage`]s to Slack and other sinks. Every
//! message carries a stable id; later messages with the same id amend the
//! earlier one instead of starting a new thread of alerts.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use notify::{Destination, MessageSink, Notifier, PodMessage, SlackChannel};
//!
//! # async fn run() -> Result<(), notify::ChannelError> {
//! let slack: Arc<dyn MessageSink> =
//!     Arc::new(SlackChannel::new("https://hooks.slack.com/services/T000/B000/XXXX"));
//! let notifier = Notifier::with_channels(vec![slack]);
//!
//! let destination = Destination::channels(vec!["alerts".to_string()]);
//! notifier
//!     .send(&PodMessage::alert(
//!         "k8s-pod-state:k8s:production:web:20200319",
//!         "Pod production/web in Kubernetes cluster k8s has not been scheduled",
//!         destination,
//!     ))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`MessageSink`] trait defines the interface for sinks
//! - [`SlackChannel`] posts to a Slack incoming webhook
//! - [`LogChannel`] writes messages to the log
//! - [`Notifier`] dispatches messages to all enabled sinks

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod message;

pub use channels::log::LogChannel;
pub use channels::slack::SlackChannel;
pub use channels::{Delivery, MessageSink};
pub use error::ChannelError;
pub use message::{Destination, PodMessage, PostMode, Severity};

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Central message dispatcher.
///
/// The `Notifier` manages multiple sinks and delivers each message to all
/// enabled sinks concurrently.
pub struct Notifier {
    channels: Vec<Arc<dyn MessageSink>>,
    disabled: bool,
}

impl Notifier {
    /// Create a notifier with specific sinks.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn MessageSink>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when messages are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any sinks are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled sinks.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    fn active(&self) -> impl Iterator<Item = &Arc<dyn MessageSink>> {
        self.channels
            .iter()
            .filter(|c| !self.disabled && c.enabled())
    }

    /// Deliver a message to every enabled sink and collect each outcome.
    pub async fn dispatch(
        &self,
        message: &PodMessage,
    ) -> Vec<(&'static str, Result<Delivery, ChannelError>)> {
        let message = Arc::new(message.clone());
        let mut set = JoinSet::new();

        for channel in self.active() {
            let channel = Arc::clone(channel);
            let message = Arc::clone(&message);
            set.spawn(async move {
                let result = channel.send(&message).await;
                (channel.name(), result)
            });
        }

        let mut results = vec![];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((channel, result)) => {
                    match &result {
                        Ok(delivery) => {
                            debug!(channel, id = %message.id, ?delivery, "Message handled");
                        }
                        Err(e) => {
                            error!(channel, id = %message.id, error = %e, "Failed to send message");
                        }
                    }
                    results.push((channel, result));
                }
                Err(e) => {
                    error!(id = %message.id, error = %e, "Message task failed");
                    results.push(("unknown", Err(ChannelError::Other(e.to_string()))));
                }
            }
        }
        results
    }

    /// Deliver a message, failing with the first sink error.
    pub async fn send(&self, message: &PodMessage) -> Result<(), ChannelError> {
        if self.disabled {
            debug!(id = %message.id, "Messages disabled, skipping");
            return Ok(());
        }
        self.dispatch(message)
            .await
            .into_iter()
            .map(|(_, result)| result)
            .find_map(Result::err)
            .map_or(Ok(()), Err)
    }

    /// Withdraw a message from every enabled sink.
    pub async fn delete(&self, id: &str) -> Result<(), ChannelError> {
        for channel in self.active() {
            channel.delete(id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_severity_colors() {
        assert_eq!(Severity::Info.color(), "#2eb886");
        assert_eq!(Severity::Warning.color(), "#f39c12");
    }

    #[tokio::test]
    async fn test_log_channel_dispatch() {
        let channels: Vec<Arc<dyn MessageSink>> = vec![Arc::new(LogChannel::new())];
        let notifier = Notifier::with_channels(channels);
        assert!(notifier.has_channels());
        let message = PodMessage::alert("id", "text", Destination::default());
        let results = notifier.dispatch(&message).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "log");
        assert!(matches!(results[0].1, Ok(Delivery::Posted)));
        assert!(notifier.send(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_send_is_noop() {
        let message = PodMessage::alert("id", "text", Destination::default());
        assert!(Notifier::disabled().send(&message).await.is_ok());
        assert!(Notifier::disabled().dispatch(&message).await.is_empty());
    }
}
