//! Health payloads shared by all workers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The three workers owned by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Audit,
    HealthMonitor,
    Cleanup,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Audit => "audit",
            WorkerKind::HealthMonitor => "health_monitor",
            WorkerKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time health of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerHealth {
    pub enabled: bool,
    pub running: bool,
    pub healthy: bool,
    /// Always `<= queue_capacity`. Zero for workers without a queue.
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub last_run: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Manager lifecycle state.
///
/// `Unhealthy` is a reported sub-state of `Running`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Stopped,
    Starting,
    Running,
    Unhealthy,
    Stopping,
}

/// Health of the whole subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedHealth {
    /// AND over the enabled workers, false unless the manager is running.
    pub healthy: bool,
    pub state: ManagerState,
    pub audit: WorkerHealth,
    pub health_monitor: WorkerHealth,
    pub cleanup: WorkerHealth,
    pub evaluated_at: DateTime<Utc>,
}

impl AggregatedHealth {
    /// Per-worker health keyed by kind.
    pub fn workers(&self) -> [(WorkerKind, &WorkerHealth); 3] {
        [
            (WorkerKind::Audit, &self.audit),
            (WorkerKind::HealthMonitor, &self.health_monitor),
            (WorkerKind::Cleanup, &self.cleanup),
        ]
    }

    /// Enabled workers currently reporting unhealthy.
    pub fn unhealthy_workers(&self) -> Vec<WorkerKind> {
        self.workers()
            .into_iter()
            .filter(|(_, h)| h.enabled && !h.healthy)
            .map(|(kind, _)| kind)
            .collect()
    }
}
