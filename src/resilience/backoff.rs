//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::AuditConfig;

/// Retry schedule for a failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_ms: u64,
    pub max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_retries,
            base_ms,
            max_ms,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_ms, self.max_ms)
    }
}

impl From<&AuditConfig> for BackoffPolicy {
    fn from(config: &AuditConfig) -> Self {
        Self::new(config.max_retries, config.base_backoff_ms, config.max_backoff_ms)
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// The delay doubles per attempt from `base_ms`, is capped at `max_ms`, and
/// gains up to 10% jitter on top.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
