//! Per-service call statistics.
//!
//! # Responsibilities
//! - Count requests, errors and cumulative latency for one service
//! - Produce consistent point-in-time snapshots
//!
//! # Design Decisions
//! - Counters are plain atomics; recording never takes a lock
//! - Writers bump the request count before the error count, readers load
//!   the error count first, so a snapshot never shows more errors than requests

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Status codes at or above this count as errors.
pub const ERROR_STATUS_THRESHOLD: u16 = 400;

/// Live counters for a single service.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    base_path: ArcSwapOption<String>,
    request_count: AtomicU64,
    error_count: AtomicU64,
    /// Cumulative latency in microseconds.
    total_latency_us: AtomicU64,
    /// 0 until the first call is recorded.
    last_status_code: AtomicU16,
    started_at: DateTime<Utc>,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, base_path: Option<String>) -> Self {
        Self {
            name: name.into(),
            base_path: ArcSwapOption::from(base_path.map(Arc::new)),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            last_status_code: AtomicU16::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_base_path(&self, base_path: impl Into<String>) {
        self.base_path.store(Some(Arc::new(base_path.into())));
    }

    /// Record one completed call.
    pub fn record(&self, status_code: u16, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);

        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.total_latency_us.fetch_add(latency_us, Ordering::SeqCst);
        if status_code >= ERROR_STATUS_THRESHOLD {
            self.error_count.fetch_add(1, Ordering::SeqCst);
        }
        self.last_status_code.store(status_code, Ordering::Relaxed);
    }

    /// Take a consistent snapshot of the counters.
    pub fn snapshot(&self) -> ServiceStats {
        let error_count = self.error_count.load(Ordering::SeqCst);
        let total_latency_us = self.total_latency_us.load(Ordering::SeqCst);
        let request_count = self.request_count.load(Ordering::SeqCst);
        let last_status_code = match self.last_status_code.load(Ordering::Relaxed) {
            0 => None,
            code => Some(code),
        };

        ServiceStats {
            name: self.name.clone(),
            base_path: self.base_path.load_full().map(|p| p.as_ref().clone()),
            request_count,
            error_count,
            total_latency_us,
            last_status_code,
            started_at: self.started_at,
        }
    }
}

/// Point-in-time statistics for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStats {
    pub name: String,
    pub base_path: Option<String>,
    pub request_count: u64,
    pub error_count: u64,
    pub total_latency_us: u64,
    pub last_status_code: Option<u16>,
    pub started_at: DateTime<Utc>,
}

impl ServiceStats {
    /// Fraction of calls that returned an error status. Zero without calls.
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.request_count as f64
    }

    pub fn total_latency(&self) -> Duration {
        Duration::from_micros(self.total_latency_us)
    }

    /// Mean latency per call. Zero without calls.
    pub fn average_latency(&self) -> Duration {
        match self.request_count {
            0 => Duration::ZERO,
            n => Duration::from_micros(self.total_latency_us / n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate_and_average_latency() {
        let entry = ServiceEntry::new("svc1", None);
        for _ in 0..8 {
            entry.record(200, Duration::from_millis(50));
        }
        for _ in 0..2 {
            entry.record(500, Duration::from_millis(300));
        }

        let stats = entry.snapshot();
        assert_eq!(stats.request_count, 10);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.error_rate(), 0.2);
        assert_eq!(stats.average_latency(), Duration::from_millis(100));
        assert_eq!(stats.total_latency(), Duration::from_millis(1000));
        assert_eq!(stats.last_status_code, Some(500));
    }

    #[test]
    fn test_client_errors_count_as_errors() {
        let entry = ServiceEntry::new("files", Some("/api/files".into()));
        entry.record(404, Duration::from_millis(1));
        entry.record(399, Duration::from_millis(1));

        let stats = entry.snapshot();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.base_path.as_deref(), Some("/api/files"));
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = ServiceEntry::new("idle", None).snapshot();
        assert_eq!(stats.error_rate(), 0.0);
        assert_eq!(stats.average_latency(), Duration::ZERO);
        assert_eq!(stats.last_status_code, None);
    }
}
