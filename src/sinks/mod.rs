//! Audit persistence sinks.
//!
//! # Data Flow
//! ```text
//! AuditWorker flush
//!     → AuditSink::persist(batch)
//!     → Ok: entries durable, hashes remembered
//!     → Err: retried with backoff by the worker
//! ```
//!
//! # Design Decisions
//! - Sinks see whole batches, never single entries
//! - Every sink error is treated as retryable; the worker bounds the retries

pub mod json_lines;
pub mod memory;
pub mod tracing_sink;

use async_trait::async_trait;
use thiserror::Error;

use crate::workers::entry::AuditLogEntry;

pub use json_lines::JsonLinesSink;
pub use memory::MemorySink;
pub use tracing_sink::TracingSink;

/// Errors returned by a sink. All of them are retryable.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for audit batches.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist the whole batch or fail.
    async fn persist(&self, batch: &[AuditLogEntry]) -> Result<(), SinkError>;
}
