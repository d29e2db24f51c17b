//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, capacities > 0, rates in [0, 1])
//! - Check relationships between fields (backoff cap >= base)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WorkerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::WorkerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &WorkerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let audit = &config.audit;
    if audit.queue_capacity == 0 {
        errors.push(ValidationError::new("audit.queue_capacity", "must be greater than 0"));
    }
    if audit.flush_interval_ms == 0 {
        errors.push(ValidationError::new("audit.flush_interval_ms", "must be greater than 0"));
    }
    if audit.flush_batch_size == 0 || audit.flush_batch_size > audit.queue_capacity {
        errors.push(ValidationError::new(
            "audit.flush_batch_size",
            format!("must be between 1 and queue_capacity ({})", audit.queue_capacity),
        ));
    }
    if audit.max_backoff_ms < audit.base_backoff_ms {
        errors.push(ValidationError::new(
            "audit.max_backoff_ms",
            "must not be lower than base_backoff_ms",
        ));
    }
    if audit.dedup_window == 0 {
        errors.push(ValidationError::new("audit.dedup_window", "must be greater than 0"));
    }

    let monitor = &config.health_monitor;
    if monitor.check_interval_secs == 0 {
        errors.push(ValidationError::new(
            "health_monitor.check_interval_secs",
            "must be greater than 0",
        ));
    }
    let threshold = monitor.unhealthy_error_rate_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ValidationError::new(
            "health_monitor.unhealthy_error_rate_threshold",
            format!("must be within [0, 1], got {}", threshold),
        ));
    }

    if config.cleanup.interval_secs == 0 {
        errors.push(ValidationError::new("cleanup.interval_secs", "must be greater than 0"));
    }
    for rule in &config.cleanup.retention {
        if rule.max_age_secs == 0 {
            errors.push(ValidationError::new(
                "cleanup.retention.max_age_secs",
                format!("must be greater than 0 for {}", rule.path.display()),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "admin.bind_address",
            format!("invalid socket address '{}'", config.admin.bind_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
