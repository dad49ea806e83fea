//! Namespace and cluster inclusion/exclusion.

use regex::Regex;

use crate::config::CheckConfig;
use crate::error::ConfigError;
use crate::pod::Pod;

/// Include/exclude pattern pair. An absent pattern places no constraint.
#[derive(Debug, Clone, Default)]
pub struct ScopePattern {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ScopePattern {
    pub fn new(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self { include, exclude }
    }

    /// Exclusion wins over inclusion.
    pub fn admits(&self, value: &str) -> bool {
        if self.exclude.as_ref().is_some_and(|re| re.is_match(value)) {
            return false;
        }
        if self.include.as_ref().is_some_and(|re| !re.is_match(value)) {
            return false;
        }
        true
    }

    pub fn include_pattern(&self) -> Option<&str> {
        self.include.as_ref().map(Regex::as_str)
    }

    pub fn exclude_pattern(&self) -> Option<&str> {
        self.exclude.as_ref().map(Regex::as_str)
    }
}

impl PartialEq for ScopePattern {
    fn eq(&self, other: &Self) -> bool {
        self.include_pattern() == other.include_pattern()
            && self.exclude_pattern() == other.exclude_pattern()
    }
}

/// Compile an optional pattern, reporting failures against parameter `name`.
pub fn compile(name: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    pattern
        .map(|p| Regex::new(p).map_err(|source| ConfigError::InvalidRegex { name, source }))
        .transpose()
}

pub fn namespace_in_scope(namespace: &str, config: &CheckConfig) -> bool {
    config.namespace_scope.admits(namespace)
}

pub fn cluster_in_scope(cluster: &str, config: &CheckConfig) -> bool {
    config.cluster_scope.admits(cluster)
}

pub fn in_scope(pod: &Pod, config: &CheckConfig) -> bool {
    cluster_in_scope(&pod.cluster, config) && namespace_in_scope(&pod.namespace, config)
}
