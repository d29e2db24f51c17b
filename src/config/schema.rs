//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the worker
//! daemon. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the background workers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    /// Audit logging pipeline.
    pub audit: AuditConfig,

    /// Service health monitoring.
    pub health_monitor: HealthMonitorConfig,

    /// Periodic cleanup sweeps.
    pub cleanup: CleanupConfig,

    /// Coordinated shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,
}

/// Audit worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Run the audit worker.
    pub enabled: bool,

    /// Maximum number of entries held in memory before new ones are dropped.
    pub queue_capacity: usize,

    /// Flush interval in milliseconds.
    pub flush_interval_ms: u64,

    /// Queue length that wakes the flush loop before the interval elapses.
    pub flush_batch_size: usize,

    /// Retries after the first failed persist of a batch.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_backoff_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_backoff_ms: u64,

    /// Number of persisted content hashes remembered for de-duplication.
    pub dedup_window: usize,

    /// JSON-lines file receiving persisted entries. Logged via tracing when unset.
    pub sink_path: Option<PathBuf>,
}

impl AuditConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 1000,
            flush_interval_ms: 5000,
            flush_batch_size: 500,
            max_retries: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 2000,
            dedup_window: 10_000,
            sink_path: None,
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Run the health monitor worker.
    pub enabled: bool,

    /// Evaluation interval in seconds.
    pub check_interval_secs: u64,

    /// Error rate (0.0..=1.0) above which a service is unhealthy.
    pub unhealthy_error_rate_threshold: f64,

    /// Observations required before a service participates in overall health.
    pub min_requests: u64,

    /// Average latency above which a service is unhealthy.
    pub max_average_latency_ms: Option<u64>,
}

impl HealthMonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 30,
            unhealthy_error_rate_threshold: 0.5,
            min_requests: 10,
            max_average_latency_ms: None,
        }
    }
}

/// Cleanup worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Run the cleanup worker.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Directories purged of files older than their retention.
    pub retention: Vec<RetentionRule>,
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            retention: Vec::new(),
        }
    }
}

/// A directory whose files expire after `max_age_secs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionRule {
    /// Directory to sweep (non-recursive).
    pub path: PathBuf,

    /// Age after which a file is removed.
    pub max_age_secs: u64,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time granted to workers to drain before they are abandoned.
    pub deadline_secs: u64,
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { deadline_secs: 10 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin endpoints.
    pub enabled: bool,

    /// Bearer token required on admin requests. Open when unset.
    pub api_key: Option<String>,

    /// Admin endpoint bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_sections() {
        let config: WorkerConfig = toml::from_str(
            r#"
            [audit]
            queue_capacity = 3

            [health_monitor]
            unhealthy_error_rate_threshold = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.audit.queue_capacity, 3);
        assert_eq!(config.audit.max_retries, 3);
        assert_eq!(config.health_monitor.unhealthy_error_rate_threshold, 0.25);
        assert_eq!(config.cleanup.interval(), Duration::from_secs(3600));
        assert!(config.admin.api_key.is_none());
    }

    #[test]
    fn test_retention_rules() {
        let config: WorkerConfig = toml::from_str(
            r#"
            [[cleanup.retention]]
            path = "/var/tmp/uploads"
            max_age_secs = 86400
            "#,
        )
        .unwrap();

        assert_eq!(config.cleanup.retention.len(), 1);
        assert_eq!(config.cleanup.retention[0].max_age_secs, 86400);
    }
}
