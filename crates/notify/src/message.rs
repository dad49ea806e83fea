//! Outbound chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default message lifetime: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Severity levels for pod messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recovery and removal notices
    Info,
    /// An alertable condition
    Warning,
}

impl Severity {
    /// Get the Slack attachment color for this severity.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Info => "#2eb886",
            Self::Warning => "#f39c12",
        }
    }

    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
        }
    }
}

/// How a message relates to earlier messages with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostMode {
    /// Post a new message, or replace the live one with the same id
    Insert,
    /// Only replace a live message with the same id; never post a new one
    UpdateOnly,
}

/// Where a message is delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

impl Destination {
    #[must_use]
    pub fn channels(channels: Vec<String>) -> Self {
        Self {
            channels,
            users: Vec::new(),
        }
    }
}

/// A message about one pod or container.
///
/// Messages sharing an `id` are successive versions of the same alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMessage {
    pub id: String,
    pub text: String,
    pub post: PostMode,
    pub severity: Severity,
    /// How long the message stays live after `timestamp`
    #[serde(with = "ttl_secs")]
    pub ttl: Duration,
    pub destination: Destination,
    pub timestamp: DateTime<Utc>,
}

impl PodMessage {
    /// An alert that should be posted whether or not it was seen before.
    #[must_use]
    pub fn alert(id: impl Into<String>, text: impl Into<String>, destination: Destination) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            post: PostMode::Insert,
            severity: Severity::Warning,
            ttl: DEFAULT_TTL,
            destination,
            timestamp: Utc::now(),
        }
    }

    /// A follow-up that only amends an earlier alert with the same id.
    #[must_use]
    pub fn update(id: impl Into<String>, text: impl Into<String>, destination: Destination) -> Self {
        Self {
            post: PostMode::UpdateOnly,
            severity: Severity::Info,
            ..Self::alert(id, text, destination)
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// When the message stops being live.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.timestamp.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
