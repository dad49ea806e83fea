//! Audit trail of alerts and handler failures.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log(&self, entry: &str);
}

/// Writes audit entries to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

#[async_trait]
impl AuditLog for TracingAudit {
    async fn log(&self, entry: &str) {
        info!(target: "audit", "{entry}");
    }
}
