//! TOML settings for the `k8s-pod-state` binary.
//!
//! ```toml
//! name = "k8s-pod-state"
//! clusters = ["production", "staging"]
//! slackWebhookUrl = "https://hooks.slack.com/services/..."
//!
//! [parameters]
//! channels = ["prod-alerts"]
//! maxRestarts = "10"
//! notReadyDelay = "10"
//! ```

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Destination, Notifier};
use podstate::SkillParameters;

use crate::audit::AuditLog;
use crate::clusters::{AllClusters, ClusterRegistry, StaticClusters};
use crate::error::{read_file, Result};
use crate::handler::HandlerContext;

/// Configuration name used when the settings do not give one.
pub const DEFAULT_NAME: &str = "k8s-pod-state";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_name")]
    pub name: String,
    /// Clusters to report on; absent means every cluster
    #[serde(default)]
    pub clusters: Option<Vec<String>>,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    pub parameters: SkillParameters,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml(&read_file(path)?)
    }

    pub fn cluster_registry(&self) -> Arc<dyn ClusterRegistry> {
        match &self.clusters {
            Some(names) => Arc::new(StaticClusters::new(names.iter().cloned())),
            None => Arc::new(AllClusters),
        }
    }

    pub fn destination(&self) -> Destination {
        Destination::channels(self.parameters.channels.clone())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.parameters.interval_minutes().saturating_mul(60))
    }

    /// Resolve the parameters and assemble a handler context.
    pub fn handler_context(
        &self,
        notifier: Notifier,
        audit: Arc<dyn AuditLog>,
    ) -> Result<HandlerContext> {
        Ok(HandlerContext {
            name: self.name.clone(),
            config: self.parameters.resolve()?,
            destination: self.destination(),
            ttl: self.ttl(),
            clusters: self.cluster_registry(),
            notifier,
            audit,
        })
    }
}
