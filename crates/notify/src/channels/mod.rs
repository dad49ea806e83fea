//! Message sink implementations.

pub mod log;
pub mod slack;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::PodMessage;

/// What a sink did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was delivered
    Posted,
    /// Nothing to do, e.g. an update for a message that was never posted
    Skipped,
}

/// Trait for message sinks (Slack, logs, etc.).
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Get the name of this sink.
    fn name(&self) -> &'static str;

    /// Check if this sink is enabled/configured.
    fn enabled(&self) -> bool;

    /// Post or update a message according to its post mode.
    async fn send(&self, message: &PodMessage) -> Result<Delivery, ChannelError>;

    /// Withdraw the message with the given id.
    async fn delete(&self, id: &str) -> Result<(), ChannelError>;
}
