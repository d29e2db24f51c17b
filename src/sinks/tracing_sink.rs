//! Sink that emits audit entries as tracing events.

use async_trait::async_trait;

use crate::sinks::{AuditSink, SinkError};
use crate::workers::entry::{AuditLevel, AuditLogEntry};

/// Forwards entries to the `audit` tracing target. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn persist(&self, batch: &[AuditLogEntry]) -> Result<(), SinkError> {
        for entry in batch {
            let attributes = serde_json::to_string(&entry.attributes)?;
            match entry.level {
                AuditLevel::Debug => tracing::debug!(target: "audit", timestamp = %entry.timestamp, %attributes, "{}", entry.message),
                AuditLevel::Info => tracing::info!(target: "audit", timestamp = %entry.timestamp, %attributes, "{}", entry.message),
                AuditLevel::Warn => tracing::warn!(target: "audit", timestamp = %entry.timestamp, %attributes, "{}", entry.message),
                AuditLevel::Error => tracing::error!(target: "audit", timestamp = %entry.timestamp, %attributes, "{}", entry.message),
            }
        }
        Ok(())
    }
}
