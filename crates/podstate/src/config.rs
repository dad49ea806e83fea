//! Check configuration.
//!
//! [`CheckConfig`] is the fully resolved, immutable configuration the rule
//! engine reads. It is produced either by [`CheckConfigBuilder`], which
//! starts with every check disabled, or by [`SkillParameters::resolve`],
//! which applies the documented user-facing defaults.
//!
//! A threshold of `0` disables its check.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scope::{compile, ScopePattern};

/// Default restart count that triggers an alert.
pub const DEFAULT_MAX_RESTARTS: u32 = 10;
/// Default not-ready delay, in minutes.
pub const DEFAULT_NOT_READY_DELAY_MINUTES: u64 = 10;
/// Default unscheduled delay, in seconds.
pub const DEFAULT_NOT_SCHEDULED_DELAY_SECONDS: u64 = 600;
/// Default init container failure count.
pub const DEFAULT_INIT_CONTAINER_FAILURE_COUNT: u32 = 3;
/// Namespaces excluded unless configured otherwise.
pub const DEFAULT_NAMESPACE_EXCLUDE: &str = "^kube-";
/// Default alert interval (message time-to-live), in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 1440;

/// Resolved configuration consumed by the rule engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckConfig {
    /// Alert on containers waiting in `CrashLoopBackOff`
    pub crash_loop_back_off: bool,
    /// Alert on containers waiting in `ImagePullBackOff`
    pub image_pull_back_off: bool,
    /// Alert on containers terminated with `OOMKilled`
    pub oom_killed: bool,
    /// Alert on containers waiting in `CreateContainerConfigError`
    pub create_container_config_error: bool,
    /// Restart count at which a container is reported
    pub max_restarts: u32,
    /// Restart count at which a failing init container is reported
    pub init_container_failure_count: u32,
    /// Seconds a running container may stay unready
    pub not_ready_delay_seconds: u64,
    /// Seconds a pod may stay unschedulable
    pub not_scheduled_delay_seconds: u64,
    /// Seconds a container may stay in `ContainerCreating`
    pub not_created_seconds: u64,
    /// Tolerated container restarts per day of pod age
    pub restarts_per_day: f64,
    pub namespace_scope: ScopePattern,
    pub cluster_scope: ScopePattern,
}

impl CheckConfig {
    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::default()
    }
}

/// Builds a [`CheckConfig`], compiling scope patterns once.
#[derive(Debug, Clone, Default)]
pub struct CheckConfigBuilder {
    config: CheckConfig,
    namespace_include: Option<String>,
    namespace_exclude: Option<String>,
    cluster_include: Option<String>,
    cluster_exclude: Option<String>,
}

impl CheckConfigBuilder {
    #[must_use]
    pub fn crash_loop_back_off(mut self, enabled: bool) -> Self {
        self.config.crash_loop_back_off = enabled;
        self
    }

    #[must_use]
    pub fn image_pull_back_off(mut self, enabled: bool) -> Self {
        self.config.image_pull_back_off = enabled;
        self
    }

    #[must_use]
    pub fn oom_killed(mut self, enabled: bool) -> Self {
        self.config.oom_killed = enabled;
        self
    }

    #[must_use]
    pub fn create_container_config_error(mut self, enabled: bool) -> Self {
        self.config.create_container_config_error = enabled;
        self
    }

    #[must_use]
    pub fn max_restarts(mut self, count: u32) -> Self {
        self.config.max_restarts = count;
        self
    }

    #[must_use]
    pub fn init_container_failure_count(mut self, count: u32) -> Self {
        self.config.init_container_failure_count = count;
        self
    }

    #[must_use]
    pub fn not_ready_delay_seconds(mut self, seconds: u64) -> Self {
        self.config.not_ready_delay_seconds = seconds;
        self
    }

    #[must_use]
    pub fn not_scheduled_delay_seconds(mut self, seconds: u64) -> Self {
        self.config.not_scheduled_delay_seconds = seconds;
        self
    }

    #[must_use]
    pub fn not_created_seconds(mut self, seconds: u64) -> Self {
        self.config.not_created_seconds = seconds;
        self
    }

    #[must_use]
    pub fn restarts_per_day(mut self, rate: f64) -> Self {
        self.config.restarts_per_day = rate;
        self
    }

    #[must_use]
    pub fn namespace_include(mut self, pattern: Option<&str>) -> Self {
        self.namespace_include = pattern.map(str::to_string);
        self
    }

    #[must_use]
    pub fn namespace_exclude(mut self, pattern: Option<&str>) -> Self {
        self.namespace_exclude = pattern.map(str::to_string);
        self
    }

    #[must_use]
    pub fn cluster_include(mut self, pattern: Option<&str>) -> Self {
        self.cluster_include = pattern.map(str::to_string);
        self
    }

    #[must_use]
    pub fn cluster_exclude(mut self, pattern: Option<&str>) -> Self {
        self.cluster_exclude = pattern.map(str::to_string);
        self
    }

    pub fn build(self) -> Result<CheckConfig, ConfigError> {
        let namespace_scope = ScopePattern::new(
            compile("namespaceIncludeRegExp", self.namespace_include.as_deref())?,
            compile("namespaceExcludeRegExp", self.namespace_exclude.as_deref())?,
        );
        let cluster_scope = ScopePattern::new(
            compile("clusterIncludeRegExp", self.cluster_include.as_deref())?,
            compile("clusterExcludeRegExp", self.cluster_exclude.as_deref())?,
        );
        Ok(CheckConfig {
            namespace_scope,
            cluster_scope,
            ..self.config
        })
    }
}

/// A numeric parameter given either as a number or as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberParameter {
    Number(u64),
    Text(String),
}

impl NumberParameter {
    fn value(&self, name: &'static str) -> Result<u64, ConfigError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name,
                value: s.clone(),
            }),
        }
    }
}

/// User-facing, partially specified configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillParameters {
    /// Chat channels alerts are sent to; at least one is required
    #[serde(default)]
    pub channels: Vec<String>,
    /// Restart count that triggers an alert, `0` disables
    pub max_restarts: Option<NumberParameter>,
    /// Minutes a container may stay unready, `0` disables
    pub not_ready_delay: Option<NumberParameter>,
    pub crash_loop_back_off: Option<bool>,
    pub image_pull_back_off: Option<bool>,
    pub oom_killed: Option<bool>,
    pub create_container_config_error: Option<bool>,
    pub init_container_failure_count: Option<u32>,
    pub not_scheduled_delay_seconds: Option<u64>,
    pub not_created_seconds: Option<u64>,
    pub restarts_per_day: Option<f64>,
    /// Minimum minutes between repeated alerts for one entity
    pub interval_minutes: Option<u64>,
    pub namespace_include_reg_exp: Option<String>,
    /// Defaults to `^kube-`; an empty string disables exclusion
    pub namespace_exclude_reg_exp: Option<String>,
    pub cluster_include_reg_exp: Option<String>,
    pub cluster_exclude_reg_exp: Option<String>,
}

impl SkillParameters {
    /// Apply defaults and produce the resolved configuration.
    pub fn resolve(&self) -> Result<CheckConfig, ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::MissingChannels);
        }

        let max_restarts = match &self.max_restarts {
            Some(p) => {
                let value = p.value("maxRestarts")?;
                u32::try_from(value).map_err(|_| ConfigError::InvalidNumber {
                    name: "maxRestarts",
                    value: value.to_string(),
                })?
            }
            None => DEFAULT_MAX_RESTARTS,
        };

        let not_ready_minutes = match &self.not_ready_delay {
            Some(p) => p.value("notReadyDelay")?,
            None => DEFAULT_NOT_READY_DELAY_MINUTES,
        };
        let not_ready_delay_seconds =
            not_ready_minutes
                .checked_mul(60)
                .ok_or_else(|| ConfigError::InvalidNumber {
                    name: "notReadyDelay",
                    value: not_ready_minutes.to_string(),
                })?;

        let restarts_per_day = match self.restarts_per_day {
            Some(rate) if !rate.is_finite() || rate < 0.0 => {
                return Err(ConfigError::InvalidNumber {
                    name: "restartsPerDay",
                    value: rate.to_string(),
                });
            }
            Some(rate) => rate,
            None => 0.0,
        };

        let namespace_exclude = self
            .namespace_exclude_reg_exp
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE_EXCLUDE);

        CheckConfig::builder()
            .crash_loop_back_off(self.crash_loop_back_off.unwrap_or(true))
            .image_pull_back_off(self.image_pull_back_off.unwrap_or(true))
            .oom_killed(self.oom_killed.unwrap_or(true))
            .create_container_config_error(self.create_container_config_error.unwrap_or(false))
            .max_restarts(max_restarts)
            .init_container_failure_count(
                self.init_container_failure_count
                    .unwrap_or(DEFAULT_INIT_CONTAINER_FAILURE_COUNT),
            )
            .not_ready_delay_seconds(not_ready_delay_seconds)
            .not_scheduled_delay_seconds(
                self.not_scheduled_delay_seconds
                    .unwrap_or(DEFAULT_NOT_SCHEDULED_DELAY_SECONDS),
            )
            .not_created_seconds(self.not_created_seconds.unwrap_or(0))
            .restarts_per_day(restarts_per_day)
            .namespace_include(non_empty(self.namespace_include_reg_exp.as_deref()))
            .namespace_exclude(non_empty(Some(namespace_exclude)))
            .cluster_include(non_empty(self.cluster_include_reg_exp.as_deref()))
            .cluster_exclude(non_empty(self.cluster_exclude_reg_exp.as_deref()))
            .build()
    }

    /// Alert interval in minutes.
    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes.unwrap_or(DEFAULT_INTERVAL_MINUTES)
    }
}

fn non_empty(pattern: Option<&str>) -> Option<&str> {
    pattern.filter(|p| !p.is_empty())
}
