//! Walks pod → init containers → containers and collects one result per
//! evaluated entity.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::CheckConfig;
use crate::naming::{container_id, container_slug, pod_id, pod_slug, ContainerKind};
use crate::pod::{EntityResult, Outcome, Pod, PodSnapshot};
use crate::rules::{checks_for, first_match, pod_deleted, pod_unscheduled, PodContext};
use crate::scope::in_scope;
use crate::status::{ContainerStatus, PodStatus};

/// Evaluate one pod at `now`.
///
/// The pod's own result is always first, followed by init containers and
/// then regular containers, each in declaration order. Returns an empty
/// list when the pod is out of scope.
pub fn check_pod_state(
    now: DateTime<Utc>,
    config: &CheckConfig,
    pod: &Pod,
    status: &PodStatus,
) -> Vec<EntityResult> {
    if !in_scope(pod, config) {
        debug!(pod = %pod_id(pod), "Pod out of scope");
        return Vec::new();
    }

    let ctx = PodContext {
        now,
        config,
        pod,
        status,
    };

    if let Some(results) = pod_deleted(&ctx) {
        debug!(pod = %pod_id(pod), entities = results.len(), "Pod deleted");
        return results;
    }

    let mut results = Vec::with_capacity(
        1 + status.init_container_statuses.len() + status.container_statuses.len(),
    );

    match pod_unscheduled(&ctx) {
        Some(message) => {
            debug!(pod = %pod_id(pod), "Pod unscheduled");
            results.push(EntityResult {
                id: pod_id(pod),
                slug: pod_slug(pod),
                outcome: Outcome::Problem(message),
            });
            return results;
        }
        None => results.push(EntityResult::healthy(pod_id(pod), pod_slug(pod))),
    }

    let mut init_failed = false;
    for container in &status.init_container_statuses {
        let result = check_container(&ctx, container, ContainerKind::Init);
        init_failed |= !result.is_healthy();
        results.push(result);
    }
    if init_failed {
        debug!(pod = %pod_id(pod), "Init container failing, skipping containers");
        return results;
    }

    for container in &status.container_statuses {
        results.push(check_container(&ctx, container, ContainerKind::Regular));
    }
    results
}

/// [`check_pod_state`] over a parsed snapshot.
pub fn evaluate(now: DateTime<Utc>, config: &CheckConfig, snapshot: &PodSnapshot) -> Vec<EntityResult> {
    check_pod_state(now, config, &snapshot.pod, &snapshot.status)
}

fn check_container(
    ctx: &PodContext<'_>,
    container: &ContainerStatus,
    kind: ContainerKind,
) -> EntityResult {
    let id = container_id(ctx.pod, container, kind);
    let slug = container_slug(ctx.pod, container, kind);
    match first_match(checks_for(kind), &ctx.container(container, kind)) {
        Some((check, message)) => {
            debug!(container = %id, check, "Check matched");
            EntityResult {
                id,
                slug,
                outcome: Outcome::Problem(message),
            }
        }
        None => EntityResult::healthy(id, slug),
    }
}
