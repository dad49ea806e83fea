//! Kubernetes pod status parsing and alert rule evaluation.
//!
//! This crate turns a raw pod status payload into a typed snapshot and runs
//! an ordered chain of condition checks over the pod and each of its
//! containers, producing one [`EntityResult`] per evaluated entity.
//!
//! # Usage
//!
//! ```no_run
//! use podstate::{evaluate, Pod, PodSnapshot, SkillParameters};
//!
//! let params: SkillParameters = serde_json::from_str(r#"{"channels": ["alerts"]}"#)?;
//! let config = params.resolve()?;
//!
//! let pod = Pod::new("k8s-prod", "production", "web-7d4b9");
//! let snapshot = PodSnapshot::parse(pod, Some(r#"{"phase": "Running"}"#))?;
//!
//! for result in evaluate(chrono::Utc::now(), &config, &snapshot) {
//!     println!("{} {:?}", result.id, result.outcome);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - [`status`] decodes the payload into [`PodStatus`]
//! - [`naming`] derives the stable ids and descriptions of pods and containers
//! - [`scope`] filters pods by namespace and cluster
//! - [`rules`] holds the individual checks and their precedence order
//! - [`assemble`] walks the pod and collects the results
//!
//! Evaluation is pure: no I/O, no shared state, and identical inputs give
//! identical results.

pub mod assemble;
pub mod config;
pub mod error;
pub mod naming;
pub mod pod;
pub mod rules;
pub mod scope;
pub mod status;

pub use assemble::{check_pod_state, evaluate};
pub use config::{CheckConfig, CheckConfigBuilder, SkillParameters};
pub use error::{ConfigError, MalformedStatus};
pub use naming::ContainerKind;
pub use pod::{EntityResult, Outcome, Pod, PodSnapshot};
pub use status::{parse_pod_status, ContainerState, ContainerStatus, PodPhase, PodStatus};
