//! Pod event handler.
//!
//! Runs each incoming pod event through the rule engine and turns every
//! entity result into a chat message:
//!
//! | outcome   | post mode     | text                  | audited |
//! |-----------|---------------|-----------------------|---------|
//! | `Problem` | `Insert`      | the problem           | yes     |
//! | `Healthy` | `UpdateOnly`  | `"{Slug} recovered"`  | no      |
//! | `Removed` | `UpdateOnly`  | the removal           | yes     |
//!
//! Message ids combine the configuration name, the entity id and the UTC
//! date, so an entity gets at most one alert thread per configuration per
//! day.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use notify::{Destination, Notifier, PodMessage};
use podstate::naming::uc_first;
use podstate::{check_pod_state, CheckConfig, EntityResult, Outcome};

use crate::audit::AuditLog;
use crate::clusters::ClusterRegistry;
use crate::event::PodEvent;

/// Everything the handler needs besides the events themselves.
pub struct HandlerContext {
    /// Configuration name, the first part of every message id
    pub name: String,
    pub config: CheckConfig,
    pub destination: Destination,
    /// Message time-to-live
    pub ttl: Duration,
    pub clusters: Arc<dyn ClusterRegistry>,
    pub notifier: Notifier,
    pub audit: Arc<dyn AuditLog>,
}

/// Outcome of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerStatus {
    /// Number of failures; alerts do not count
    pub code: u32,
    pub reason: String,
    /// Not worth showing to users
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl HandlerStatus {
    pub fn success(reason: impl Into<String>) -> Self {
        Self {
            code: 0,
            reason: reason.into(),
            hidden: false,
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

struct Reason {
    code: u32,
    reason: String,
}

/// Message id for an entity on the UTC date of `now`.
pub fn message_id(name: &str, entity_id: &str, now: DateTime<Utc>) -> String {
    format!("{name}:{entity_id}:{}", now.format("%Y%m%d"))
}

/// Build the chat message for one entity result.
pub fn entity_message(ctx: &HandlerContext, result: &EntityResult, now: DateTime<Utc>) -> PodMessage {
    let id = message_id(&ctx.name, &result.id, now);
    let destination = ctx.destination.clone();
    let message = match &result.outcome {
        Outcome::Problem(text) => PodMessage::alert(id, text.as_str(), destination),
        Outcome::Healthy => PodMessage::update(
            id,
            format!("{} recovered", uc_first(&result.slug)),
            destination,
        ),
        Outcome::Removed(text) => PodMessage::update(id, text.as_str(), destination),
    };
    message.with_ttl(ctx.ttl).with_timestamp(now)
}

/// Evaluate `events` at `now`, dispatch messages, and summarize.
pub async fn handle(ctx: &HandlerContext, events: &[PodEvent], now: DateTime<Utc>) -> HandlerStatus {
    let mut reasons: Vec<Reason> = vec![];

    for event in events {
        info!(
            pod = %event.slug(),
            status = event.status_json.as_deref().unwrap_or_default(),
            "Pod status"
        );

        if !ctx.clusters.contains(&event.cluster_name).await {
            ctx.audit
                .log(&format!(
                    "Cluster {} of {} does not match k8s integrations in configuration {}",
                    event.cluster_name,
                    event.description(),
                    ctx.name
                ))
                .await;
            continue;
        }

        let snapshot = match event.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let reason = format!(
                    "Failed to parse status of {}: {e}",
                    event.description()
                );
                warn!(pod = %event.slug(), error = %e, "Failed to parse pod status");
                ctx.audit.log(&reason).await;
                reasons.push(Reason { code: 1, reason });
                continue;
            }
        };

        let results = check_pod_state(now, &ctx.config, &snapshot.pod, &snapshot.status);
        debug!(pod = %event.slug(), entities = results.len(), "Pod evaluated");

        for result in &results {
            let message = entity_message(ctx, result, now);
            match ctx.notifier.send(&message).await {
                Ok(()) => {
                    if let Some(error) = result.error() {
                        ctx.audit.log(error).await;
                    }
                    if matches!(result.outcome, Outcome::Removed(_)) {
                        if let Err(e) = ctx.notifier.delete(&message.id).await {
                            warn!(id = %message.id, error = %e, "Failed to withdraw message");
                        }
                    }
                }
                Err(e) => {
                    let reason = format!("Failed to send message {}: {e}", message.id);
                    ctx.audit.log(&reason).await;
                    reasons.push(Reason { code: 1, reason });
                }
            }
        }

        reasons.extend(results.iter().filter_map(|r| {
            r.error().map(|error| Reason {
                code: 0,
                reason: error.to_string(),
            })
        }));
    }

    if reasons.is_empty() {
        return HandlerStatus::success("All pods healthy").hidden();
    }
    HandlerStatus {
        code: reasons.iter().map(|r| r.code).sum(),
        reason: reasons
            .into_iter()
            .map(|r| r.reason)
            .collect::<Vec<_>>()
            .join("; "),
        hidden: false,
    }
}
