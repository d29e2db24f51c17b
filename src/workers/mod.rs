//! Background workers and their manager.
//!
//! # Responsibilities
//! - Buffer and persist audit entries (`audit`)
//! - Judge service health from recorded calls (`health`)
//! - Run periodic maintenance sweeps (`cleanup`)
//! - Start, stop and aggregate the health of all three (`manager`)
//!
//! # Data Flow
//! ```text
//! request handlers ──add_audit_log──▶ AuditWorker ──batch──▶ AuditSink
//!                  ──record_call───▶ ServiceRegistry ◀──tick── HealthMonitorWorker
//!                                    CleanupWorker ──tick/trigger──▶ Sweepers
//! WorkerManager ──spawn / Shutdown broadcast / health()──▶ each worker
//! ```

pub mod audit;
pub mod cleanup;
pub mod entry;
pub mod error;
pub mod health;
pub mod manager;
pub mod status;

use std::sync::atomic::{AtomicBool, Ordering};

pub use audit::{AuditMetrics, AuditWorker};
pub use cleanup::{CleanupReport, CleanupWorker, SweeperOutcome};
pub use entry::{AuditLevel, AuditLogEntry};
pub use error::{WorkerError, WorkerResult};
pub use health::{HealthMonitorWorker, ServiceHealth, ServiceHealthReport};
pub use manager::WorkerManager;
pub use status::{AggregatedHealth, ManagerState, WorkerHealth, WorkerKind};

/// Clears a flag when dropped, including when the owning task is aborted.
pub(crate) struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    pub(crate) fn new(flag: &'a AtomicBool) -> Self {
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
