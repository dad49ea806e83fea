//! Typed pod status model and decoding of the raw status payload.
//!
//! The payload is the JSON `status` object of a Kubernetes pod as published
//! by the pod event source. String values shaped like a strict UTC ISO-8601
//! timestamp (`YYYY-MM-DDTHH:MM:SS[.fff]Z`, first year digit 1-9) are
//! timestamps. Any other value in a time field is treated as absent.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::MalformedStatus;

/// Strict UTC timestamp shape. ASCII digit classes only.
static TIMESTAMP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9][0-9]*-[01][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9](?:\.[0-9]+)?Z$")
        .expect("valid timestamp regex")
});

/// Returns true if `value` has the shape of a status timestamp.
pub fn is_timestamp(value: &str) -> bool {
    TIMESTAMP_PATTERN.is_match(value)
}

/// Convert a status timestamp string into a time value.
///
/// Returns `None` for strings that do not match [`is_timestamp`] or that
/// match the shape but name an impossible date.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if !is_timestamp(value) {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Decode a raw pod status payload.
pub fn parse_pod_status(raw: Option<&str>) -> Result<PodStatus, MalformedStatus> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(MalformedStatus::Missing)?;
    let value: Value = serde_json::from_str(raw).map_err(MalformedStatus::Json)?;
    if !value.is_object() {
        return Err(MalformedStatus::NotAnObject);
    }
    serde_json::from_value(value).map_err(MalformedStatus::Decode)
}

/// High-level pod lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Reported by the event source when the pod object is removed
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Pod status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub phase: PodPhase,
    /// When the kubelet acknowledged the pod
    #[serde(
        default,
        deserialize_with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: Vec<PodCondition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_statuses: Vec<ContainerStatus>,
    /// Evaluated before `container_statuses`
    #[serde(default, deserialize_with = "null_as_default")]
    pub init_container_statuses: Vec<ContainerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qos_class: Option<String>,
}

impl PodStatus {
    /// Find the first condition of the given type with the given reason.
    pub fn condition(&self, condition_type: &str, reason: &str) -> Option<&PodCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type && c.reason.as_deref() == Some(reason))
    }
}

/// One entry of `status.conditions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodCondition {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub condition_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// Status of a single (init) container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    /// Readiness probe result; absent means unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, deserialize_with = "restart_count")]
    pub restart_count: u32,
    #[serde(
        default,
        deserialize_with = "container_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<ContainerState>,
}

impl ContainerStatus {
    pub fn waiting(&self) -> Option<&Waiting> {
        match &self.state {
            Some(ContainerState::Waiting(w)) => Some(w),
            _ => None,
        }
    }

    pub fn running(&self) -> Option<&Running> {
        match &self.state {
            Some(ContainerState::Running(r)) => Some(r),
            _ => None,
        }
    }

    pub fn terminated(&self) -> Option<&Terminated> {
        match &self.state {
            Some(ContainerState::Terminated(t)) => Some(t),
            _ => None,
        }
    }

    /// Reason of the current waiting state, if waiting.
    pub fn waiting_reason(&self) -> Option<&str> {
        self.waiting().and_then(|w| w.reason.as_deref())
    }
}

/// Current state of a container. At most one is reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Waiting(Waiting),
    Running(Running),
    Terminated(Terminated),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waiting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Running {
    #[serde(
        default,
        deserialize_with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terminated {
    #[serde(default, deserialize_with = "null_as_default")]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        deserialize_with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Wire shape of a container state: an object with optional keys.
#[derive(Deserialize, Default)]
struct RawContainerState {
    #[serde(default)]
    waiting: Option<Waiting>,
    #[serde(default)]
    running: Option<Running>,
    #[serde(default)]
    terminated: Option<Terminated>,
}

// Waiting wins over terminated, terminated over running.
fn container_state<'de, D>(deserializer: D) -> Result<Option<ContainerState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawContainerState>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .waiting
        .map(ContainerState::Waiting)
        .or_else(|| raw.terminated.map(ContainerState::Terminated))
        .or_else(|| raw.running.map(ContainerState::Running)))
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

fn restart_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CREATING: &str = r#"{"phase":"Pending","conditions":[{"type":"Initialized","status":"True","lastProbeTime":null,"lastTransitionTime":"2019-12-08T19:08:18Z"},{"type":"Ready","status":"False","lastProbeTime":null,"lastTransitionTime":"2019-12-08T19:13:46Z","reason":"ContainersNotReady","message":"containers with unready status: [io0]"},{"type":"ContainersReady","status":"False","lastProbeTime":null,"lastTransitionTime":"2019-12-08T19:13:46Z","reason":"ContainersNotReady","message":"containers with unready status: [io0]"},{"type":"PodScheduled","status":"True","lastProbeTime":null,"lastTransitionTime":"2019-12-08T19:08:18Z"}],"hostIP":"10.0.0.60","startTime":"2019-12-08T19:08:18Z","containerStatuses":[{"name":"io0","state":{"waiting":{"reason":"ContainerCreating"}},"lastState":{},"ready":false,"restartCount":0,"image":"atomist/io0:0.2.2-20191208190707","imageID":""}],"qosClass":"Burstable"}"#;

    #[test]
    fn test_parses_pod_status() {
        let status = parse_pod_status(Some(CREATING)).unwrap();
        assert_eq!(status.phase, PodPhase::Pending);
        assert_eq!(
            status.start_time,
            Some(Utc.with_ymd_and_hms(2019, 12, 8, 19, 8, 18).unwrap())
        );
        assert_eq!(status.conditions.len(), 4);
        assert_eq!(status.conditions[1].condition_type, "Ready");
        assert_eq!(status.conditions[1].reason.as_deref(), Some("ContainersNotReady"));
        assert_eq!(
            status.conditions[1].last_transition_time,
            Some(Utc.with_ymd_and_hms(2019, 12, 8, 19, 13, 46).unwrap())
        );
        assert!(status.init_container_statuses.is_empty());
        assert_eq!(status.qos_class.as_deref(), Some("Burstable"));

        let container = &status.container_statuses[0];
        assert_eq!(container.name, "io0");
        assert_eq!(container.image, "atomist/io0:0.2.2-20191208190707");
        assert_eq!(container.ready, Some(false));
        assert_eq!(container.restart_count, 0);
        assert_eq!(container.waiting_reason(), Some("ContainerCreating"));
    }

    #[test]
    fn test_timestamp_shape() {
        assert!(is_timestamp("2020-03-19T19:23:09Z"));
        assert!(is_timestamp("2020-03-19T19:23:09.876Z"));
        assert!(is_timestamp("12020-03-19T19:23:09Z"));
        assert!(!is_timestamp("0001-01-01T00:00:00Z"));
        assert!(!is_timestamp("2020-03-19T19:23:09+00:00"));
        assert!(!is_timestamp("2020-03-19 19:23:09Z"));
        assert!(!is_timestamp("2020-03-19T19:23:09.Z"));
        assert!(!is_timestamp("x2020-03-19T19:23:09Z"));
    }

    #[test]
    fn test_parse_timestamp_keeps_milliseconds() {
        let t = parse_timestamp("2020-03-19T20:23:09.876Z").unwrap();
        assert_eq!(t.timestamp_millis(), 1_584_649_389_876);
    }

    #[test]
    fn test_non_matching_times_are_absent() {
        let status = parse_pod_status(Some(
            r#"{"phase":"Running","startTime":"0001-01-01T00:00:00Z","containerStatuses":[{"name":"a","image":"i","state":{"running":{"startedAt":"yesterday"}}}]}"#,
        ))
        .unwrap();
        assert_eq!(status.start_time, None);
        assert_eq!(
            status.container_statuses[0].running(),
            Some(&Running { started_at: None })
        );
    }

    #[test]
    fn test_impossible_date_is_absent() {
        assert!(is_timestamp("2020-19-39T29:59:59Z"));
        assert_eq!(parse_timestamp("2020-19-39T29:59:59Z"), None);
    }

    #[test]
    fn test_missing_payload() {
        assert!(matches!(parse_pod_status(None), Err(MalformedStatus::Missing)));
        assert!(matches!(parse_pod_status(Some("  ")), Err(MalformedStatus::Missing)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_pod_status(Some("{\"phase\":")),
            Err(MalformedStatus::Json(_))
        ));
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(parse_pod_status(Some("null")), Err(MalformedStatus::NotAnObject)));
        assert!(matches!(parse_pod_status(Some("[1,2]")), Err(MalformedStatus::NotAnObject)));
    }

    #[test]
    fn test_wrong_shape() {
        assert!(matches!(
            parse_pod_status(Some(r#"{"conditions":"none"}"#)),
            Err(MalformedStatus::Decode(_))
        ));
    }

    #[test]
    fn test_unknown_and_null_phase() {
        let status = parse_pod_status(Some(r#"{"phase":"Evicted"}"#)).unwrap();
        assert_eq!(status.phase, PodPhase::Unknown);
        let status = parse_pod_status(Some(r#"{"phase":null,"conditions":null}"#)).unwrap();
        assert_eq!(status.phase, PodPhase::Unknown);
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn test_terminated_state() {
        let status = parse_pod_status(Some(
            r#"{"phase":"Failed","containerStatuses":[{"name":"kaniko","image":"k","ready":false,"restartCount":0,"lastState":{},"state":{"terminated":{"exitCode":1,"reason":"OOMKilled","startedAt":"2020-04-24T20:46:48Z","finishedAt":"2020-04-24T20:50:21Z"}}}]}"#,
        ))
        .unwrap();
        let terminated = status.container_statuses[0].terminated().unwrap();
        assert_eq!(terminated.exit_code, 1);
        assert_eq!(terminated.reason.as_deref(), Some("OOMKilled"));
        assert_eq!(
            terminated.finished_at,
            Some(Utc.with_ymd_and_hms(2020, 4, 24, 20, 50, 21).unwrap())
        );
    }

    #[test]
    fn test_empty_state_is_absent() {
        let status =
            parse_pod_status(Some(r#"{"containerStatuses":[{"name":"a","state":{}}]}"#)).unwrap();
        assert_eq!(status.container_statuses[0].state, None);
        assert_eq!(status.container_statuses[0].ready, None);
    }

    #[test]
    fn test_null_fields_take_defaults() {
        let status = parse_pod_status(Some(
            r#"{"conditions":[{"type":"Ready","status":null},{"type":null}],"containerStatuses":[{"name":null,"image":null,"state":{"terminated":{"exitCode":null,"reason":"OOMKilled"}}}]}"#,
        ))
        .unwrap();
        assert_eq!(status.conditions[0].condition_type, "Ready");
        assert_eq!(status.conditions[0].status, "");
        assert_eq!(status.conditions[1].condition_type, "");
        let container = &status.container_statuses[0];
        assert_eq!(container.name, "");
        assert_eq!(container.image, "");
        let terminated = container.terminated().unwrap();
        assert_eq!(terminated.exit_code, 0);
        assert_eq!(terminated.reason.as_deref(), Some("OOMKilled"));
    }

    #[test]
    fn test_bad_restart_count_is_zero() {
        let status = parse_pod_status(Some(
            r#"{"containerStatuses":[{"name":"a","restartCount":-3},{"name":"b","restartCount":"7"}]}"#,
        ))
        .unwrap();
        assert_eq!(status.container_statuses[0].restart_count, 0);
        assert_eq!(status.container_statuses[1].restart_count, 0);
    }

    #[test]
    fn test_serializes_in_kubernetes_shape() {
        let status = parse_pod_status(Some(CREATING)).unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "Pending");
        assert_eq!(
            json["containerStatuses"][0]["state"]["waiting"]["reason"],
            "ContainerCreating"
        );
        assert_eq!(json["startTime"], "2019-12-08T19:08:18Z");
    }
}
