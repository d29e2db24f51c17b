//! Metrics collection and exposition.
//!
//! # Metrics
//! - `audit_entries_total` (counter): submissions by outcome
//!   (`queued`, `dropped`, `rejected`, `duplicate`)
//! - `audit_flushes_total` (counter): flush cycles by outcome
//! - `audit_queue_size` (gauge): entries waiting for the next flush
//! - `service_calls_total` (counter): recorded calls by service and class
//! - `service_healthy` (gauge): 1=healthy, 0=unhealthy, per service
//! - `cleanup_runs_total` (counter): sweeps by trigger and outcome
//! - `cleanup_duration_seconds` (histogram): sweep duration
//! - `workers_healthy` (gauge): aggregated manager health
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade; recording is a
//!   no-op until an exporter is installed
//! - Prometheus exporter serves its own HTTP listener

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_audit_entry(outcome: &'static str) {
    counter!("audit_entries_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_duplicates(count: usize) {
    counter!("audit_entries_total", "outcome" => "duplicate").increment(count as u64);
}

pub fn record_audit_flush(outcome: &'static str, entries: usize) {
    counter!("audit_flushes_total", "outcome" => outcome).increment(1);
    if outcome == "success" {
        counter!("audit_entries_persisted_total").increment(entries as u64);
    }
}

pub fn record_audit_queue_size(size: usize) {
    gauge!("audit_queue_size").set(size as f64);
}

pub fn record_service_call(service: &str, status_code: u16) {
    let class = match status_code {
        500..=u16::MAX => "5xx",
        400..=499 => "4xx",
        _ => "ok",
    };
    counter!("service_calls_total", "service" => service.to_string(), "class" => class)
        .increment(1);
}

pub fn record_service_health(service: &str, healthy: bool) {
    gauge!("service_healthy", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_cleanup_run(trigger: &'static str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "error" };
    counter!("cleanup_runs_total", "trigger" => trigger, "outcome" => outcome).increment(1);
    histogram!("cleanup_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_workers_healthy(healthy: bool) {
    gauge!("workers_healthy").set(if healthy { 1.0 } else { 0.0 });
}
