//! Worker error taxonomy.

use thiserror::Error;

use crate::workers::status::WorkerKind;

/// Errors surfaced by the worker subsystem.
///
/// Producer-facing calls (`add_audit_log`, `record_call`) never return these;
/// `CapacityExceeded` and `TransientSinkFailure` are recorded internally and
/// only show up in logs and metrics.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkerError {
    /// The audit queue was full; the entry was dropped.
    #[error("Audit queue at capacity ({capacity})")]
    CapacityExceeded { capacity: usize },

    /// The persistence sink kept failing after all retries.
    #[error("Sink failed after {attempts} attempts: {reason}")]
    TransientSinkFailure { attempts: u32, reason: String },

    /// Duplicate start, or a cleanup trigger while a sweep is active.
    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    /// Unknown service name.
    #[error("Service not found: {0}")]
    NotFound(String),

    /// Workers that did not stop before the deadline.
    #[error("Workers did not stop cleanly: {}", format_kinds(workers))]
    ShutdownTimeout { workers: Vec<WorkerKind> },

    /// Audit entry rejected by validation.
    #[error("Invalid audit entry: {0}")]
    InvalidEntry(String),

    /// A cleanup sweeper failed.
    #[error("Sweeper '{sweeper}' failed: {reason}")]
    Sweep { sweeper: String, reason: String },

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No async runtime to start workers on.
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}

fn format_kinds(kinds: &[WorkerKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkerError::ShutdownTimeout {
            workers: vec![WorkerKind::Audit, WorkerKind::Cleanup],
        };
        assert_eq!(err.to_string(), "Workers did not stop cleanly: audit, cleanup");

        let err = WorkerError::AlreadyRunning("cleanup");
        assert_eq!(err.to_string(), "cleanup is already running");

        let err = WorkerError::CapacityExceeded { capacity: 3 };
        assert_eq!(err.to_string(), "Audit queue at capacity (3)");
    }
}
