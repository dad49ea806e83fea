//! Pod identity, evaluation snapshot, and per-entity results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedStatus;
use crate::status::{parse_pod_status, PodStatus};

/// Identity of a pod as reported by the event source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
    /// Pod creation time
    pub created_at: Option<DateTime<Utc>>,
}

impl Pod {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            name: name.into(),
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A pod together with its decoded status, evaluated as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PodSnapshot {
    pub pod: Pod,
    pub status: PodStatus,
}

impl PodSnapshot {
    /// Decode `raw_status` and pair it with `pod`.
    pub fn parse(pod: Pod, raw_status: Option<&str>) -> Result<Self, MalformedStatus> {
        let status = parse_pod_status(raw_status)?;
        Ok(Self { pod, status })
    }
}

/// What one evaluation concluded about one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    /// An alertable condition holds; the message describes it
    Problem(String),
    /// Nothing alertable this round
    Healthy,
    /// The entity no longer exists; the message describes the removal
    Removed(String),
}

/// Result for a pod or one of its containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResult {
    /// Stable dedup key, see [`crate::naming`]
    pub id: String,
    /// Human-readable description of the entity
    pub slug: String,
    pub outcome: Outcome,
}

impl EntityResult {
    pub fn healthy(id: String, slug: String) -> Self {
        Self {
            id,
            slug,
            outcome: Outcome::Healthy,
        }
    }

    /// The problem or removal message, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Problem(message) | Outcome::Removed(message) => Some(message),
            Outcome::Healthy => None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.outcome == Outcome::Healthy
    }
}
