//! Sink that writes messages to the log instead of a chat service.

use async_trait::async_trait;
use tracing::info;

use super::{Delivery, MessageSink};
use crate::error::ChannelError;
use crate::message::PodMessage;

/// Logs every message at `info` level. Always enabled.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageSink for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, message: &PodMessage) -> Result<Delivery, ChannelError> {
        info!(
            channel = "log",
            id = %message.id,
            post = ?message.post,
            severity = message.severity.as_str(),
            channels = ?message.destination.channels,
            ttl_secs = message.ttl.as_secs(),
            "{}",
            message.text
        );
        Ok(Delivery::Posted)
    }

    async fn delete(&self, id: &str) -> Result<(), ChannelError> {
        info!(channel = "log", id, "Message withdrawn");
        Ok(())
    }
}
