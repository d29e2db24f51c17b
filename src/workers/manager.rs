//! Worker lifecycle orchestration.
//!
//! # Responsibilities
//! - Spawn every enabled worker on the current runtime
//! - Broadcast shutdown and wait for all workers up to a deadline
//! - Aggregate per-worker health into one subsystem view
//!
//! # Design Decisions
//! - One `Shutdown` per run, so the manager can be started again after a
//!   clean or unclean stop
//! - Workers are awaited concurrently against a single deadline; any worker
//!   still running at the deadline is aborted and reported
//! - Disabled workers are neither spawned nor counted in the aggregate

use chrono::Utc;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::validation::validate_config;
use crate::config::WorkerConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;
use crate::sinks::AuditSink;
use crate::sweepers::Sweeper;
use crate::workers::audit::AuditWorker;
use crate::workers::cleanup::CleanupWorker;
use crate::workers::error::{WorkerError, WorkerResult};
use crate::workers::health::HealthMonitorWorker;
use crate::workers::status::{AggregatedHealth, ManagerState, WorkerKind};

struct ManagerInner {
    state: ManagerState,
    shutdown: Option<Shutdown>,
    handles: Vec<(WorkerKind, JoinHandle<()>)>,
}

/// Owns the three workers and their lifecycle.
pub struct WorkerManager {
    audit: Arc<AuditWorker>,
    health_monitor: Arc<HealthMonitorWorker>,
    cleanup: Arc<CleanupWorker>,
    inner: Mutex<ManagerInner>,
}

impl WorkerManager {
    /// Build all workers from configuration.
    ///
    /// The configuration is validated first; an invalid one fails with
    /// `InvalidConfig` listing every problem.
    pub fn new(
        config: &WorkerConfig,
        sink: Arc<dyn AuditSink>,
        sweepers: Vec<Arc<dyn Sweeper>>,
    ) -> WorkerResult<Self> {
        validate_config(config).map_err(|errors| {
            WorkerError::InvalidConfig(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        Ok(Self {
            audit: Arc::new(AuditWorker::new(config.audit.clone(), sink)),
            health_monitor: Arc::new(HealthMonitorWorker::new(
                config.health_monitor.clone(),
                ServiceRegistry::new(),
            )),
            cleanup: Arc::new(CleanupWorker::new(config.cleanup.clone(), sweepers)),
            inner: Mutex::new(ManagerInner {
                state: ManagerState::Stopped,
                shutdown: None,
                handles: Vec::new(),
            }),
        })
    }

    pub fn audit(&self) -> &Arc<AuditWorker> {
        &self.audit
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitorWorker> {
        &self.health_monitor
    }

    pub fn cleanup(&self) -> &Arc<CleanupWorker> {
        &self.cleanup
    }

    pub fn registry(&self) -> &ServiceRegistry {
        self.health_monitor.registry()
    }

    /// Spawn all enabled workers.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// `AlreadyRunning` unless the manager is stopped.
    pub fn start(&self) -> WorkerResult<()> {
        let runtime = Handle::try_current().map_err(|e| WorkerError::Runtime(e.to_string()))?;

        let mut inner = self.inner.lock();
        if inner.state != ManagerState::Stopped {
            return Err(WorkerError::AlreadyRunning("worker manager"));
        }
        inner.state = ManagerState::Starting;

        let shutdown = Shutdown::new();
        let mut handles = Vec::with_capacity(3);
        if self.audit.is_enabled() {
            handles.push((WorkerKind::Audit, self.audit.spawn(&runtime, shutdown.subscribe())));
        }
        if self.health_monitor.is_enabled() {
            handles.push((
                WorkerKind::HealthMonitor,
                self.health_monitor.spawn(&runtime, shutdown.subscribe()),
            ));
        }
        if self.cleanup.is_enabled() {
            handles.push((WorkerKind::Cleanup, self.cleanup.spawn(&runtime, shutdown.subscribe())));
        }

        let started: Vec<&str> = handles.iter().map(|(kind, _)| kind.as_str()).collect();
        tracing::info!(workers = ?started, "Background workers started");

        inner.handles = handles;
        inner.shutdown = Some(shutdown);
        inner.state = ManagerState::Running;
        Ok(())
    }

    /// Signal shutdown and wait for every worker until `deadline`.
    ///
    /// Workers still running at the deadline are aborted and returned in
    /// `ShutdownTimeout`. The manager ends up `Stopped` either way. Calling
    /// this while stopped is a no-op; calling it while another stop is in
    /// flight fails with `AlreadyRunning`.
    pub async fn stop(&self, deadline: std::time::Duration) -> WorkerResult<()> {
        let (shutdown, handles) = {
            let mut inner = self.inner.lock();
            match inner.state {
                ManagerState::Running => {}
                ManagerState::Stopping => return Err(WorkerError::AlreadyRunning("shutdown")),
                state => {
                    tracing::debug!(?state, "Stop requested while not running");
                    return Ok(());
                }
            }
            inner.state = ManagerState::Stopping;
            (inner.shutdown.take(), std::mem::take(&mut inner.handles))
        };

        let receivers = shutdown.as_ref().map(Shutdown::trigger).unwrap_or(0);
        tracing::info!(receivers, deadline_ms = deadline.as_millis() as u64, "Stopping background workers");

        let deadline_at = Instant::now() + deadline;
        let results = join_all(handles.into_iter().map(|(kind, mut handle)| async move {
            match time::timeout_at(deadline_at, &mut handle).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    tracing::error!(worker = %kind, error = %e, "Worker task failed");
                    Some(kind)
                }
                Err(_) => {
                    tracing::warn!(worker = %kind, "Worker missed shutdown deadline, aborting");
                    handle.abort();
                    Some(kind)
                }
            }
        }))
        .await;

        let unclean: Vec<WorkerKind> = results.into_iter().flatten().collect();
        self.inner.lock().state = ManagerState::Stopped;

        if unclean.is_empty() {
            tracing::info!("Background workers stopped");
            Ok(())
        } else {
            Err(WorkerError::ShutdownTimeout { workers: unclean })
        }
    }

    /// Current lifecycle state. `Running` is reported as `Unhealthy` when
    /// any enabled worker is unhealthy.
    pub fn state(&self) -> ManagerState {
        let state = self.inner.lock().state;
        if state == ManagerState::Running && !self.workers_healthy() {
            return ManagerState::Unhealthy;
        }
        state
    }

    fn workers_healthy(&self) -> bool {
        [
            self.audit.health(),
            self.health_monitor.health(),
            self.cleanup.health(),
        ]
        .iter()
        .all(|h| !h.enabled || h.healthy)
    }

    /// Health of every worker plus the aggregate judgment.
    pub fn health_status(&self) -> AggregatedHealth {
        let stored = self.inner.lock().state;
        let audit = self.audit.health();
        let health_monitor = self.health_monitor.health();
        let cleanup = self.cleanup.health();

        let workers_healthy = [&audit, &health_monitor, &cleanup]
            .iter()
            .all(|h| !h.enabled || h.healthy);
        let healthy = stored == ManagerState::Running && workers_healthy;
        let state = if stored == ManagerState::Running && !workers_healthy {
            ManagerState::Unhealthy
        } else {
            stored
        };

        metrics::record_workers_healthy(healthy);
        AggregatedHealth {
            healthy,
            state,
            audit,
            health_monitor,
            cleanup,
            evaluated_at: Utc::now(),
        }
    }
}
