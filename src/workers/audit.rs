//! Audit logging worker.
//!
//! # Responsibilities
//! - Accept audit entries from any number of callers without blocking them
//! - Persist queued entries in batches on a timer or when the queue fills up
//! - Retry failed batches with backoff, then give up and count the failure
//!
//! # Design Decisions
//! - Bounded queue with drop-newest overflow: a full queue discards the
//!   incoming entry, never an entry that is already queued
//! - Submission never returns an error; problems surface in metrics and logs
//! - Hashes of persisted entries are remembered (bounded window) so a batch
//!   replayed after a reported success is not written twice

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::AuditConfig;
use crate::observability::metrics;
use crate::resilience::BackoffPolicy;
use crate::sinks::AuditSink;
use crate::workers::entry::{AuditLevel, AuditLogEntry};
use crate::workers::error::WorkerError;
use crate::workers::status::WorkerHealth;
use crate::workers::RunningGuard;

/// Counters and state exposed by the audit worker.
#[derive(Debug, Clone, Serialize)]
pub struct AuditMetrics {
    pub total_processed: u64,
    pub total_dropped: u64,
    pub total_rejected: u64,
    pub total_duplicates: u64,
    pub failure_count: u64,
    pub failed_entries: u64,
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub last_flush: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub config: AuditConfig,
}

#[derive(Debug, Default)]
struct FlushStatus {
    last_flush: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Hashes of entries persisted in this session, oldest evicted first.
#[derive(Debug)]
struct PersistedHashes {
    window: usize,
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl PersistedHashes {
    fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    fn contains(&self, hash: &str) -> bool {
        self.set.contains(hash)
    }

    fn insert(&mut self, hash: String) {
        if !self.set.insert(hash.clone()) {
            return;
        }
        self.order.push_back(hash);
        if self.order.len() > self.window {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
    }
}

/// Batches audit entries into a persistence sink.
pub struct AuditWorker {
    config: AuditConfig,
    backoff: BackoffPolicy,
    sink: Arc<dyn AuditSink>,
    queue: Mutex<VecDeque<AuditLogEntry>>,
    wake: Notify,
    /// Serializes flush cycles and owns the de-duplication memory.
    persisted: tokio::sync::Mutex<PersistedHashes>,
    processed: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
    failed_entries: AtomicU64,
    running: AtomicBool,
    status: Mutex<FlushStatus>,
}

impl AuditWorker {
    pub fn new(config: AuditConfig, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            backoff: BackoffPolicy::from(&config),
            persisted: tokio::sync::Mutex::new(PersistedHashes::new(config.dedup_window)),
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
            config,
            sink,
            wake: Notify::new(),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            failed_entries: AtomicU64::new(0),
            running: AtomicBool::new(false),
            status: Mutex::new(FlushStatus::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Submit an entry. Never blocks and never fails observably.
    ///
    /// Invalid entries are counted as rejected; entries arriving at a full
    /// queue are counted as dropped.
    pub fn add_audit_log(&self, mut entry: AuditLogEntry) {
        if !self.config.enabled {
            tracing::trace!(message = %entry.message, "Audit worker disabled, discarding entry");
            return;
        }

        if let Err(e) = entry.validate() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            metrics::record_audit_entry("rejected");
            tracing::warn!(error = %e, "Audit entry rejected");
            return;
        }
        entry.content_hash = Some(entry.compute_hash());

        let queued_len = {
            let mut queue = self.queue.lock();
            if queue.len() >= self.config.queue_capacity {
                None
            } else {
                queue.push_back(entry);
                Some(queue.len())
            }
        };

        match queued_len {
            Some(len) => {
                metrics::record_audit_entry("queued");
                metrics::record_audit_queue_size(len);
                if len >= self.config.flush_batch_size {
                    self.wake.notify_one();
                }
            }
            None => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::record_audit_entry("dropped");
                let err = WorkerError::CapacityExceeded {
                    capacity: self.config.queue_capacity,
                };
                tracing::debug!(error = %err, total_dropped = dropped, "Dropping audit entry");
            }
        }
    }

    /// Build and submit an entry in one call.
    pub fn log(&self, level: AuditLevel, message: impl Into<String>) {
        self.add_audit_log(AuditLogEntry::new(level, message));
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run one flush cycle now. Returns how many entries were persisted.
    pub async fn flush_now(&self) -> Result<usize, WorkerError> {
        let mut persisted = self.persisted.lock().await;

        let mut batch: Vec<AuditLogEntry> = {
            let mut queue = self.queue.lock();
            Vec::from(std::mem::take(&mut *queue))
        };
        metrics::record_audit_queue_size(self.queue_size());

        let before = batch.len();
        let mut in_batch = HashSet::with_capacity(before);
        batch.retain(|entry| {
            let hash = entry.hash();
            !persisted.contains(&hash) && in_batch.insert(hash)
        });
        let skipped = before - batch.len();
        if skipped > 0 {
            self.duplicates.fetch_add(skipped as u64, Ordering::Relaxed);
            metrics::record_audit_duplicates(skipped);
            tracing::debug!(skipped, "Skipped already persisted audit entries");
        }

        if batch.is_empty() {
            self.status.lock().last_flush = Some(Utc::now());
            return Ok(0);
        }

        match self.persist_with_retry(&batch).await {
            Ok(()) => {
                for entry in &batch {
                    persisted.insert(entry.hash());
                }
                self.processed.fetch_add(batch.len() as u64, Ordering::Relaxed);
                {
                    let mut status = self.status.lock();
                    status.last_flush = Some(Utc::now());
                    status.last_error = None;
                }
                metrics::record_audit_flush("success", batch.len());
                tracing::debug!(entries = batch.len(), "Audit batch persisted");
                Ok(batch.len())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.failed_entries.fetch_add(batch.len() as u64, Ordering::Relaxed);
                self.status.lock().last_error = Some(e.to_string());
                metrics::record_audit_flush("failure", batch.len());
                tracing::error!(entries = batch.len(), error = %e, "Dropping audit batch");
                Err(e)
            }
        }
    }

    async fn persist_with_retry(&self, batch: &[AuditLogEntry]) -> Result<(), WorkerError> {
        let mut retry = 0;
        loop {
            match self.sink.persist(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if retry >= self.backoff.max_retries => {
                    return Err(WorkerError::TransientSinkFailure {
                        attempts: retry + 1,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    retry += 1;
                    let delay = self.backoff.delay(retry);
                    tracing::warn!(retry, delay = ?delay, error = %e, "Audit sink failed, retrying");
                    time::sleep(delay).await;
                }
            }
        }
    }

    pub fn metrics(&self) -> AuditMetrics {
        let (last_flush, last_error) = {
            let status = self.status.lock();
            (status.last_flush, status.last_error.clone())
        };
        AuditMetrics {
            total_processed: self.processed.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
            total_duplicates: self.duplicates.load(Ordering::Relaxed),
            failure_count: self.failures.load(Ordering::Relaxed),
            failed_entries: self.failed_entries.load(Ordering::Relaxed),
            queue_size: self.queue_size(),
            queue_capacity: self.config.queue_capacity,
            last_flush,
            last_error,
            config: self.config.clone(),
        }
    }

    /// Healthy while running and the latest flush did not exhaust its retries.
    pub fn health(&self) -> WorkerHealth {
        let queue_size = self.queue_size();
        let running = self.is_running();
        let status = self.status.lock();
        WorkerHealth {
            enabled: self.config.enabled,
            running,
            healthy: running && status.last_error.is_none(),
            queue_size,
            queue_capacity: self.config.queue_capacity,
            last_run: status.last_flush,
            error: status.last_error.clone(),
        }
    }

    /// Spawn the flush loop on `runtime`.
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
        let period = self.config.flush_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            capacity = self.config.queue_capacity,
            interval_ms = self.config.flush_interval_ms,
            "Audit worker starting"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.flush_now().await;
                }
                _ = self.wake.notified() => {
                    let _ = self.flush_now().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Audit worker received shutdown signal, draining queue");
                    break;
                }
            }
        }

        let _ = self.flush_now().await;
        tracing::info!(pending = self.queue_size(), "Audit worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;
    use std::time::Duration;

    fn test_config(capacity: usize) -> AuditConfig {
        AuditConfig {
            queue_capacity: capacity,
            flush_batch_size: capacity,
            flush_interval_ms: 60_000,
            max_retries: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            ..AuditConfig::default()
        }
    }

    fn messages(sink: &MemorySink) -> Vec<String> {
        sink.entries().into_iter().map(|e| e.message).collect()
    }

    #[tokio::test]
    async fn test_drop_newest_when_full() {
        let sink = Arc::new(MemorySink::new());
        let worker = AuditWorker::new(test_config(3), sink.clone());

        for msg in ["A", "B", "C", "D"] {
            worker.log(AuditLevel::Info, msg);
        }

        let metrics = worker.metrics();
        assert_eq!(metrics.queue_size, 3);
        assert_eq!(metrics.total_dropped, 1);

        assert_eq!(worker.flush_now().await.unwrap(), 3);
        assert_eq!(messages(&sink), vec!["A", "B", "C"]);
        assert_eq!(worker.queue_size(), 0);
    }

    #[test]
    fn test_concurrent_producers_never_exceed_capacity() {
        let worker = Arc::new(AuditWorker::new(test_config(100), Arc::new(MemorySink::new())));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let worker = worker.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        worker.log(AuditLevel::Debug, format!("thread {} entry {}", t, i));
                        assert!(worker.queue_size() <= 100);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let metrics = worker.metrics();
        assert_eq!(metrics.queue_size, 100);
        assert_eq!(metrics.total_dropped, 2000 - 100);
    }

    #[tokio::test]
    async fn test_replayed_entry_persisted_once() {
        let sink = Arc::new(MemorySink::new());
        let worker = AuditWorker::new(test_config(10), sink.clone());
        let entry = AuditLogEntry::new(AuditLevel::Info, "file shared").with_attribute("file_id", 9);

        worker.add_audit_log(entry.clone());
        worker.flush_now().await.unwrap();
        worker.add_audit_log(entry.clone());
        worker.add_audit_log(entry);
        assert_eq!(worker.flush_now().await.unwrap(), 0);

        assert_eq!(sink.len(), 1);
        assert_eq!(worker.metrics().total_duplicates, 2);
        assert_eq!(worker.metrics().total_processed, 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let sink = Arc::new(MemorySink::new());
        sink.fail_next(2);
        let worker = AuditWorker::new(test_config(10), sink.clone());

        worker.log(AuditLevel::Warn, "subject archived");
        assert_eq!(worker.flush_now().await.unwrap(), 1);
        assert_eq!(sink.attempts(), 3);
        assert_eq!(worker.metrics().failure_count, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_batch() {
        let sink = Arc::new(MemorySink::new());
        sink.fail_next(10);
        let mut config = test_config(10);
        config.max_retries = 2;
        let worker = AuditWorker::new(config, sink.clone());

        worker.log(AuditLevel::Error, "deadline sync failed");
        let err = worker.flush_now().await.unwrap_err();
        assert!(matches!(err, WorkerError::TransientSinkFailure { attempts: 3, .. }));

        let metrics = worker.metrics();
        assert_eq!(metrics.failure_count, 1);
        assert_eq!(metrics.failed_entries, 1);
        assert_eq!(metrics.queue_size, 0);
        assert!(worker.health().error.is_some());

        sink.fail_next(0);
        worker.log(AuditLevel::Info, "deadline sync recovered");
        assert_eq!(worker.flush_now().await.unwrap(), 1);
        assert!(worker.health().error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_entry_rejected() {
        let worker = AuditWorker::new(test_config(10), Arc::new(MemorySink::new()));
        worker.log(AuditLevel::Info, "");
        assert_eq!(worker.queue_size(), 0);
        assert_eq!(worker.metrics().total_rejected, 1);
    }

    #[tokio::test]
    async fn test_full_batch_wakes_flush_loop() {
        let sink = Arc::new(MemorySink::new());
        let mut config = test_config(10);
        config.flush_batch_size = 2;
        let worker = Arc::new(AuditWorker::new(config, sink.clone()));

        let (tx, rx) = broadcast::channel(1);
        let handle = worker.spawn(&Handle::current(), rx);
        assert!(worker.is_running());

        worker.log(AuditLevel::Info, "one");
        worker.log(AuditLevel::Info, "two");
        tokio::time::timeout(Duration::from_secs(2), async {
            while sink.len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("flush loop did not wake");

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let sink = Arc::new(MemorySink::new());
        let worker = Arc::new(AuditWorker::new(test_config(10), sink.clone()));

        let (tx, rx) = broadcast::channel(1);
        let handle = worker.spawn(&Handle::current(), rx);
        worker.log(AuditLevel::Info, "pending at shutdown");

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(messages(&sink), vec!["pending at shutdown"]);
    }

    #[test]
    fn test_dedup_window_evicts_oldest() {
        let mut hashes = PersistedHashes::new(2);
        hashes.insert("a".into());
        hashes.insert("b".into());
        hashes.insert("a".into());
        hashes.insert("c".into());

        assert!(!hashes.contains("a"));
        assert!(hashes.contains("b"));
        assert!(hashes.contains("c"));
    }
}
