//! Periodic cleanup worker.
//!
//! # Responsibilities
//! - Run every registered sweeper on a fixed interval
//! - Allow an operator to force a sweep on demand
//! - Keep the outcome of the latest sweep for health reporting
//!
//! # Design Decisions
//! - At most one sweep runs at a time; the in-progress flag is claimed with
//!   a compare-exchange so a scheduled tick and a manual trigger cannot both
//!   win
//! - A manual trigger that loses the race fails fast with `AlreadyRunning`
//!   instead of queueing behind the active sweep
//! - A failing sweeper does not stop the remaining ones

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::CleanupConfig;
use crate::observability::metrics;
use crate::sweepers::Sweeper;
use crate::workers::error::WorkerError;
use crate::workers::status::WorkerHealth;
use crate::workers::RunningGuard;

/// Result of one sweeper within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweeperOutcome {
    pub name: String,
    pub removed: u64,
    pub error: Option<String>,
}

/// Result of one cleanup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SweeperOutcome>,
    pub total_removed: u64,
    /// First sweeper error, if any.
    pub error: Option<String>,
}

impl CleanupReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn first_failure(&self) -> Option<WorkerError> {
        self.outcomes.iter().find_map(|o| {
            o.error.as_ref().map(|reason| WorkerError::Sweep {
                sweeper: o.name.clone(),
                reason: reason.clone(),
            })
        })
    }
}

pub struct CleanupWorker {
    config: CleanupConfig,
    sweepers: Vec<Arc<dyn Sweeper>>,
    running: AtomicBool,
    in_progress: AtomicBool,
    last_report: ArcSwapOption<CleanupReport>,
}

impl CleanupWorker {
    pub fn new(config: CleanupConfig, sweepers: Vec<Arc<dyn Sweeper>>) -> Self {
        Self {
            config,
            sweepers,
            running: AtomicBool::new(false),
            in_progress: AtomicBool::new(false),
            last_report: ArcSwapOption::empty(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether a sweep is active right now.
    pub fn is_sweeping(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run a sweep in the caller's task.
    ///
    /// Fails immediately with `AlreadyRunning` if another sweep holds the
    /// in-progress flag. On completion returns the report, or the first
    /// sweeper error. The report is recorded either way.
    pub async fn trigger_cleanup_now(&self) -> Result<CleanupReport, WorkerError> {
        let report = self.run_exclusive("manual").await?;
        match report.first_failure() {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Latest completed run.
    pub fn last_report(&self) -> Option<Arc<CleanupReport>> {
        self.last_report.load_full()
    }

    pub fn health(&self) -> WorkerHealth {
        let report = self.last_report();
        let running = self.is_running();
        let error = report.as_ref().and_then(|r| r.error.clone());
        WorkerHealth {
            enabled: self.config.enabled,
            running,
            healthy: running && error.is_none(),
            queue_size: 0,
            queue_capacity: 0,
            last_run: report.map(|r| r.finished_at),
            error,
        }
    }

    async fn run_exclusive(&self, trigger: &'static str) -> Result<CleanupReport, WorkerError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkerError::AlreadyRunning("cleanup"));
        }
        let _in_progress = RunningGuard::new(&self.in_progress);
        Ok(self.sweep(trigger).await)
    }

    async fn sweep(&self, trigger: &'static str) -> CleanupReport {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(self.sweepers.len());

        for sweeper in &self.sweepers {
            let outcome = match sweeper.sweep().await {
                Ok(removed) => SweeperOutcome {
                    name: sweeper.name().to_string(),
                    removed,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(sweeper = sweeper.name(), error = %e, "Sweeper failed");
                    SweeperOutcome {
                        name: sweeper.name().to_string(),
                        removed: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let total_removed = outcomes.iter().map(|o| o.removed).sum();
        let error = outcomes
            .iter()
            .find_map(|o| o.error.as_ref().map(|e| format!("{}: {}", o.name, e)));
        let report = CleanupReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
            total_removed,
            error,
        };

        metrics::record_cleanup_run(trigger, report.is_success(), started.elapsed());
        tracing::info!(
            trigger,
            removed = report.total_removed,
            success = report.is_success(),
            "Cleanup run finished"
        );

        self.last_report.store(Some(Arc::new(report.clone())));
        report
    }

    pub fn spawn(
        self: &Arc<Self>,
        runtime: &Handle,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let worker = Arc::clone(self);
        runtime.spawn(async move {
            let _running = RunningGuard::new(&worker.running);
            worker.run(shutdown).await;
        })
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = self.config.interval_secs,
            sweepers = self.sweepers.len(),
            "Cleanup worker starting"
        );

        let period = self.config.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_exclusive("scheduled").await {
                        tracing::debug!(error = %e, "Skipping scheduled cleanup");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cleanup worker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweepers::SweepError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct CountingSweeper {
        name: &'static str,
        per_run: u64,
        runs: AtomicU64,
        delay: Duration,
        started: Notify,
        fail: bool,
    }

    impl CountingSweeper {
        fn new(name: &'static str, per_run: u64) -> Self {
            Self {
                name,
                per_run,
                runs: AtomicU64::new(0),
                delay: Duration::ZERO,
                started: Notify::new(),
                fail: false,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl Sweeper for CountingSweeper {
        fn name(&self) -> &str {
            self.name
        }

        async fn sweep(&self) -> Result<u64, SweepError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SweepError::Failed("storage offline".into()));
            }
            Ok(self.per_run)
        }
    }

    fn worker(sweepers: Vec<Arc<dyn Sweeper>>) -> Arc<CleanupWorker> {
        Arc::new(CleanupWorker::new(CleanupConfig::default(), sweepers))
    }

    #[tokio::test]
    async fn test_manual_trigger_reports_removed() {
        let worker = worker(vec![
            Arc::new(CountingSweeper::new("uploads", 3)),
            Arc::new(CountingSweeper::new("sessions", 2)),
        ]);

        let report = worker.trigger_cleanup_now().await.unwrap();
        assert_eq!(report.total_removed, 5);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.is_success());
        assert_eq!(worker.last_report().unwrap().total_removed, 5);
        assert!(!worker.is_sweeping());
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_rejected() {
        let slow = Arc::new(CountingSweeper::new("slow", 1).slow(Duration::from_millis(200)));
        let worker = worker(vec![slow.clone()]);

        let first = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.trigger_cleanup_now().await })
        };
        slow.started.notified().await;

        let second = worker.trigger_cleanup_now().await;
        assert_eq!(second, Err(WorkerError::AlreadyRunning("cleanup")));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.total_removed, 1);
        assert_eq!(slow.runs.load(Ordering::SeqCst), 1);

        // Flag released after completion.
        assert!(worker.trigger_cleanup_now().await.is_ok());
        assert_eq!(slow.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_sweeper_does_not_stop_others() {
        let broken = Arc::new(CountingSweeper::new("broken", 0).failing());
        let healthy = Arc::new(CountingSweeper::new("healthy", 4));
        let worker = worker(vec![broken.clone(), healthy.clone()]);

        let err = worker.trigger_cleanup_now().await.unwrap_err();
        assert_eq!(
            err,
            WorkerError::Sweep {
                sweeper: "broken".into(),
                reason: "storage offline".into()
            }
        );
        assert_eq!(healthy.runs.load(Ordering::SeqCst), 1);

        let report = worker.last_report().unwrap();
        assert_eq!(report.total_removed, 4);
        assert!(report.error.as_deref().unwrap().starts_with("broken"));
        assert!(worker.health().error.is_some());
        assert!(!worker.is_sweeping());
    }

    #[tokio::test]
    async fn test_scheduled_loop_runs_and_stops() {
        let sweeper = Arc::new(CountingSweeper::new("uploads", 1));
        let config = CleanupConfig {
            interval_secs: 1,
            ..CleanupConfig::default()
        };
        let worker = Arc::new(CleanupWorker::new(config, vec![sweeper.clone()]));
        let (tx, rx) = broadcast::channel(1);

        let handle = worker.spawn(&Handle::current(), rx);
        assert!(worker.is_running());

        tokio::time::timeout(Duration::from_secs(3), sweeper.started.notified())
            .await
            .unwrap();

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(!worker.is_running());
        assert!(sweeper.runs.load(Ordering::SeqCst) >= 1);

        let health = worker.health();
        assert!(!health.healthy);
        assert!(health.last_run.is_some());
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_health_before_first_run() {
        let worker = worker(vec![]);
        let health = worker.health();
        assert!(health.enabled);
        assert!(!health.running);
        assert!(health.last_run.is_none());
        assert_eq!(health.queue_capacity, 0);
    }
}
