//! Stable identifiers and descriptions for pods and containers.
//!
//! Identifiers are the dedup keys downstream notifiers use to update or
//! withdraw earlier alerts, so their format must not change:
//!
//! - pod: `cluster:namespace:pod`
//! - container: `cluster:namespace:pod:container`
//! - init container: `cluster:namespace:pod:init:container`

use crate::pod::Pod;
use crate::status::ContainerStatus;

/// Whether a container is an init container or a regular one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Init,
    Regular,
}

impl ContainerKind {
    pub fn is_init(self) -> bool {
        self == Self::Init
    }
}

pub fn pod_id(pod: &Pod) -> String {
    [pod.cluster.as_str(), &pod.namespace, &pod.name].join(":")
}

pub fn container_id(pod: &Pod, container: &ContainerStatus, kind: ContainerKind) -> String {
    let mut parts = vec![pod_id(pod)];
    if kind.is_init() {
        parts.push("init".to_string());
    }
    parts.push(container.name.clone());
    parts.join(":")
}

pub fn pod_slug(pod: &Pod) -> String {
    format!(
        "pod {}/{} in Kubernetes cluster {}",
        pod.namespace, pod.name, pod.cluster
    )
}

pub fn container_slug(pod: &Pod, container: &ContainerStatus, kind: ContainerKind) -> String {
    format!(
        "{}container {} ({}) of {}",
        if kind.is_init() { "init " } else { "" },
        container.name,
        container.image,
        pod_slug(pod)
    )
}

/// Uppercase the first character.
pub fn uc_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
