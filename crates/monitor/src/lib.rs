//! Pod state alert handler.
//!
//! Wires the collaborators around the [`podstate`] rule engine: cluster
//! membership, status parsing, chat dispatch through [`notify`], and the
//! audit trail. The `k8s-pod-state` binary drives [`handler::handle`] from
//! the command line.

pub mod audit;
pub mod clusters;
pub mod error;
pub mod event;
pub mod handler;
pub mod settings;

pub use audit::{AuditLog, TracingAudit};
pub use clusters::{AllClusters, ClusterRegistry, StaticClusters};
pub use error::MonitorError;
pub use event::{load_events, parse_events, PodEvent};
pub use handler::{handle, HandlerContext, HandlerStatus};
pub use settings::Settings;
