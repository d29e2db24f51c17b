//! In-memory sink with failure injection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use crate::sinks::{AuditSink, SinkError};
use crate::workers::entry::AuditLogEntry;

/// Keeps persisted entries in memory.
///
/// Can be told to fail the next N persists or to stall each persist, which
/// makes retry and shutdown behavior observable.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<AuditLogEntry>>,
    attempts: AtomicU32,
    failures_left: AtomicU32,
    delay: Mutex<Option<Duration>>,
    started: Notify,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` persist calls.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Sleep this long inside every persist call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Resolves when a persist call begins.
    pub async fn persist_started(&self) {
        self.started.notified().await;
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Persist calls seen, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn persist(&self, batch: &[AuditLogEntry]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SinkError::Unavailable("injected failure".into()));
        }

        self.entries.lock().extend_from_slice(batch);
        Ok(())
    }
}
