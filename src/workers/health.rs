//! Service health monitoring worker.
//!
//! # Responsibilities
//! - Record per-call statistics from request-handling middleware
//! - Periodically turn those statistics into a health judgment
//! - Publish the latest judgment as a snapshot readers never wait on
//!
//! # Design Decisions
//! - Services below `min_requests` observations are reported but do not
//!   affect overall health
//! - Error rate must strictly exceed the threshold to mark a service unhealthy
//! - State transitions are logged once, on the evaluation that observes them

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthMonitorConfig;
use crate::observability::metrics;
use crate::registry::{ServiceRegistry, ServiceStats};
use crate::workers::error::WorkerError;
use crate::workers::status::WorkerHealth;
use crate::workers::RunningGuard;

/// Health judgment for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub healthy: bool,
    /// Whether the service had enough observations to be judged.
    pub observed: bool,
    pub request_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub average_latency_ms: f64,
    pub last_status_code: Option<u16>,
    pub reason: Option<String>,
}

/// Result of one evaluation over all known services.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealthReport {
    pub healthy: bool,
    pub evaluated_at: DateTime<Utc>,
    pub services: Vec<ServiceHealth>,
}

impl ServiceHealthReport {
    pub fn unhealthy_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceHealth> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Judge every service against the configured thresholds.
pub fn evaluate(stats: &[ServiceStats], config: &HealthMonitorConfig) -> ServiceHealthReport {
    let max_latency = config.max_average_latency_ms.map(Duration::from_millis);

    let services: Vec<ServiceHealth> = stats
        .iter()
        .map(|s| {
            let error_rate = s.error_rate();
            let average_latency = s.average_latency();
            let observed = s.request_count >= config.min_requests;

            let reason = if !observed {
                None
            } else if error_rate > config.unhealthy_error_rate_threshold {
                Some(format!(
                    "error rate {:.3} exceeds {:.3}",
                    error_rate, config.unhealthy_error_rate_threshold
                ))
            } else {
                match max_latency {
                    Some(max) if average_latency > max => Some(format!(
                        "average latency {:?} exceeds {:?}",
                        average_latency, max
                    )),
                    _ => None,
                }
            };

            ServiceHealth {
                name: s.name.clone(),
                healthy: reason.is_none(),
                observed,
                request_count: s.request_count,
                error_count: s.error_count,
                error_rate,
                average_latency_ms: average_latency.as_micros() as f64 / 1000.0,
                last_status_code: s.last_status_code,
                reason,
            }
        })
        .collect();

    ServiceHealthReport {
        healthy: services.iter().filter(|s| s.observed).all(|s| s.healthy),
        evaluated_at: Utc::now(),
        services,
    }
}

/// Evaluates the service registry on a fixed interval.
pub struct HealthMonitorWorker {
    config: HealthMonitorConfig,
    registry: ServiceRegistry,
    report: ArcSwapOption<ServiceHealthReport>,
    running: AtomicBool,
}

impl HealthMonitorWorker {
    pub fn new(config: HealthMonitorConfig, registry: ServiceRegistry) -> Self {
        Self {
            config,
            registry,
            report: ArcSwapOption::empty(),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Record a completed call. Safe from any number of threads; never fails.
    pub fn record_call(&self, service: &str, status_code: u16, latency: Duration) {
        self.registry.record_call(service, status_code, latency);
        metrics::record_service_call(service, status_code);
    }

    /// Register a service with its base path before it receives traffic.
    pub fn register_service(&self, name: &str, base_path: &str) {
        self.registry.register(name, base_path);
    }

    pub fn get_service_stats(&self, name: &str) -> Result<ServiceStats, WorkerError> {
        self.registry
            .get(name)
            .ok_or_else(|| WorkerError::NotFound(name.to_string()))
    }

    /// Known service names, sorted. Empty until the first call is recorded.
    pub fn get_all_services(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Latest evaluation, evaluating immediately if none has run yet.
    pub fn service_health_status(&self) -> Arc<ServiceHealthReport> {
        match self.report.load_full() {
            Some(report) => report,
            None => self.evaluate_now(),
        }
    }

    /// Evaluate all services and publish the result.
    pub fn evaluate_now(&self) -> Arc<ServiceHealthReport> {
        let report = Arc::new(evaluate(&self.registry.snapshot_all(), &self.config));

        let previous: HashMap<String, bool> = self
            .report
            .load_full()
            .map(|r| r.services.iter().map(|s| (s.name.clone(), s.healthy)).collect())
            .unwrap_or_default();

        for service in &report.services {
            metrics::record_service_health(&service.name, service.healthy);
            let was_healthy = previous.get(&service.name).copied().unwrap_or(true);
            match (was_healthy, service.healthy) {
                (true, false) => tracing::warn!(
                    service = %service.name,
                    reason = service.reason.as_deref().unwrap_or_default(),
                    "Service became unhealthy"
                ),
                (false, true) => tracing::info!(service = %service.name, "Service recovered"),
                _ => {}
            }
        }

        tracing::debug!(
            services = report.services.len(),
            healthy = report.healthy,
            "Service health evaluated"
        );
        self.report.store(Some(report.clone()));
        report
    }

    /// Healthy while running and the latest evaluation found no unhealthy service.
    pub fn health(&self) -> WorkerHealth {
        let running = self.is_running();
        let report = self.report.load_full();
        let unhealthy = report
            .as_ref()
            .map(|r| r.unhealthy_services().join(", "))
            .unwrap_or_default();

        WorkerHealth {
            enabled: self.config.enabled,
            running,
            healthy: running && unhealthy.is_empty(),
            queue_size: 0,
            queue_capacity: 0,
            last_run: report.as_ref().map(|r| r.evaluated_at),
            error: (!unhealthy.is_empty()).then(|| format!("unhealthy services: {}", unhealthy)),
        }
    }

    /// Spawn the evaluation loop on `runtime`.
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
            interval = self.config.check_interval_secs,
            threshold = self.config.unhealthy_error_rate_threshold,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evaluate_now();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.evaluate_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> HealthMonitorConfig {
        HealthMonitorConfig {
            unhealthy_error_rate_threshold: 0.25,
            min_requests: 5,
            ..HealthMonitorConfig::default()
        }
    }

    fn monitor() -> HealthMonitorWorker {
        HealthMonitorWorker::new(test_config(), ServiceRegistry::new())
    }

    #[test]
    fn test_error_rate_and_average_latency() {
        let monitor = monitor();
        for _ in 0..8 {
            monitor.record_call("svc1", 200, Duration::from_millis(50));
        }
        for _ in 0..2 {
            monitor.record_call("svc1", 500, Duration::from_millis(300));
        }

        let report = monitor.evaluate_now();
        let svc = report.service("svc1").unwrap();
        assert_eq!(svc.error_rate, 0.2);
        assert_eq!(svc.average_latency_ms, 100.0);
        assert!(svc.healthy);
        assert!(report.healthy);
    }

    #[test]
    fn test_error_rate_above_threshold_is_unhealthy() {
        let monitor = monitor();
        for _ in 0..6 {
            monitor.record_call("files", 200, Duration::from_millis(5));
        }
        for _ in 0..4 {
            monitor.record_call("files", 503, Duration::from_millis(5));
        }
        monitor.record_call("auth", 200, Duration::from_millis(5));

        let report = monitor.evaluate_now();
        assert!(!report.healthy);
        assert_eq!(report.unhealthy_services(), vec!["files"]);
        assert!(report.service("files").unwrap().reason.is_some());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let monitor = monitor();
        for status in [200, 200, 200, 500] {
            monitor.record_call("subjects", status, Duration::ZERO);
            monitor.record_call("subjects", status, Duration::ZERO);
        }
        let report = monitor.evaluate_now();
        assert_eq!(report.service("subjects").unwrap().error_rate, 0.25);
        assert!(report.healthy);
    }

    #[test]
    fn test_under_observed_services_do_not_count() {
        let monitor = monitor();
        for _ in 0..4 {
            monitor.record_call("folders", 500, Duration::ZERO);
        }

        let report = monitor.evaluate_now();
        let folders = report.service("folders").unwrap();
        assert!(!folders.observed);
        assert!(folders.healthy);
        assert!(report.healthy);
    }

    #[test]
    fn test_latency_threshold() {
        let mut config = test_config();
        config.max_average_latency_ms = Some(100);
        let monitor = HealthMonitorWorker::new(config, ServiceRegistry::new());
        for _ in 0..5 {
            monitor.record_call("uploads", 200, Duration::from_millis(250));
        }

        let report = monitor.evaluate_now();
        assert!(!report.healthy);
        assert!(report.service("uploads").unwrap().reason.as_deref().unwrap().contains("latency"));
    }

    #[test]
    fn test_stats_lookup() {
        let monitor = monitor();
        assert!(monitor.get_all_services().is_empty());
        assert_eq!(
            monitor.get_service_stats("ghost"),
            Err(WorkerError::NotFound("ghost".into()))
        );

        monitor.register_service("deadlines", "/api/deadlines");
        monitor.record_call("deadlines", 200, Duration::from_millis(2));
        let stats = monitor.get_service_stats("deadlines").unwrap();
        assert_eq!(stats.request_count, 1);
        assert_eq!(monitor.get_all_services(), vec!["deadlines"]);
    }

    #[test]
    fn test_status_evaluates_lazily() {
        let monitor = monitor();
        monitor.record_call("auth", 200, Duration::ZERO);
        let report = monitor.service_health_status();
        assert_eq!(report.services.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_record_call() {
        let monitor = Arc::new(monitor());
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let monitor = monitor.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        monitor.record_call("svc1", 200, Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(monitor.get_service_stats("svc1").unwrap().request_count, 1000);
    }

    #[tokio::test]
    async fn test_loop_publishes_and_stops() {
        let monitor = Arc::new(monitor());
        monitor.record_call("auth", 200, Duration::ZERO);

        let (tx, rx) = broadcast::channel(1);
        let handle = monitor.spawn(&Handle::current(), rx);
        assert!(monitor.health().running);

        tx.send(()).unwrap();
        handle.await.unwrap();

        let health = monitor.health();
        assert!(!health.running);
        assert!(health.last_run.is_some());
    }
}
