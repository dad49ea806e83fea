//! Pod events as published by the cluster event source.

use serde::{Deserialize, Serialize};
use std::path::Path;

use podstate::naming::{pod_slug, uc_first};
use podstate::status::parse_timestamp;
use podstate::{MalformedStatus, Pod, PodSnapshot};

use crate::error::{read_file, Result};

/// One pod state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodEvent {
    /// Cluster the pod runs in; older publishers call it `environment`
    #[serde(alias = "environment")]
    pub cluster_name: String,
    pub namespace: String,
    pub name: String,
    /// Pod creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Raw pod status object, JSON encoded
    #[serde(rename = "statusJSON", default, skip_serializing_if = "Option::is_none")]
    pub status_json: Option<String>,
}

impl PodEvent {
    /// Pod identity. An unparseable timestamp leaves the creation time unknown.
    pub fn pod(&self) -> Pod {
        let pod = Pod::new(&self.cluster_name, &self.namespace, &self.name);
        match self.timestamp.as_deref().and_then(parse_timestamp) {
            Some(created_at) => pod.with_created_at(created_at),
            None => pod,
        }
    }

    pub fn snapshot(&self) -> std::result::Result<PodSnapshot, MalformedStatus> {
        PodSnapshot::parse(self.pod(), self.status_json.as_deref())
    }

    /// Pod description, e.g. `pod production/web in Kubernetes cluster k8s`.
    pub fn description(&self) -> String {
        pod_slug(&self.pod())
    }

    /// Capitalized [`description`](Self::description) for log lines.
    pub fn slug(&self) -> String {
        uc_first(&self.description())
    }
}

/// Parse a JSON array of pod events.
pub fn parse_events(json: &str) -> Result<Vec<PodEvent>> {
    Ok(serde_json::from_str(json)?)
}

/// Load a JSON array of pod events from a file.
pub fn load_events(path: &Path) -> Result<Vec<PodEvent>> {
    parse_events(&read_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_environment_alias() {
        let events = parse_events(
            r#"[{"environment":"k8s-internal-demo","namespace":"production","name":"web","timestamp":"2020-03-19T19:23:09Z","statusJSON":"{}"}]"#,
        )
        .unwrap();
        assert_eq!(events[0].cluster_name, "k8s-internal-demo");
        let pod = events[0].pod();
        assert_eq!(
            pod.created_at,
            Some(Utc.with_ymd_and_hms(2020, 3, 19, 19, 23, 9).unwrap())
        );
        assert_eq!(
            events[0].slug(),
            "Pod production/web in Kubernetes cluster k8s-internal-demo"
        );
    }

    #[test]
    fn test_bad_timestamp_is_unknown() {
        let event = PodEvent {
            cluster_name: "c".into(),
            namespace: "n".into(),
            name: "p".into(),
            timestamp: Some("yesterday".into()),
            status_json: None,
        };
        assert_eq!(event.pod().created_at, None);
        assert!(matches!(event.snapshot(), Err(MalformedStatus::Missing)));
    }

    #[test]
    fn test_not_an_array() {
        assert!(parse_events(r#"{"name":"p"}"#).is_err());
    }
}
