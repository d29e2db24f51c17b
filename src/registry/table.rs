//! Concurrent table of service statistics.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::registry::service::{ServiceEntry, ServiceStats};

/// A thread-safe registry of per-service call statistics.
///
/// Cloning is cheap and every clone shares the same table. Entries are
/// created on first use and never evicted.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<DashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Arc<ServiceEntry> {
        if let Some(entry) = self.inner.get(name) {
            return entry.value().clone();
        }
        self.inner
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ServiceEntry::new(name, None)))
            .value()
            .clone()
    }

    /// Record a completed call, creating the service on first sight.
    pub fn record_call(&self, name: &str, status_code: u16, latency: Duration) {
        self.entry(name).record(status_code, latency);
    }

    /// Register a service with its base path, or update the path of a known one.
    pub fn register(&self, name: &str, base_path: &str) {
        self.entry(name).set_base_path(base_path);
    }

    /// Snapshot of one service, if it has ever been seen.
    pub fn get(&self, name: &str) -> Option<ServiceStats> {
        self.inner.get(name).map(|r| r.value().snapshot())
    }

    /// Names of all known services, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshots of all known services, sorted by name.
    pub fn snapshot_all(&self) -> Vec<ServiceStats> {
        let mut stats: Vec<ServiceStats> = self.inner.iter().map(|r| r.value().snapshot()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_register_then_record() {
        let registry = ServiceRegistry::new();
        registry.register("deadlines", "/api/deadlines");
        registry.record_call("deadlines", 201, Duration::from_millis(3));

        let stats = registry.get("deadlines").unwrap();
        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.base_path.as_deref(), Some("/api/deadlines"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = ServiceRegistry::new();
        registry.record_call("subjects", 200, Duration::ZERO);
        registry.record_call("auth", 200, Duration::ZERO);
        registry.record_call("files", 200, Duration::ZERO);

        assert_eq!(registry.names(), vec!["auth", "files", "subjects"]);
    }

    #[test]
    fn test_concurrent_record_call_loses_no_updates() {
        let registry = ServiceRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry.record_call("svc1", 200, Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let stats = registry.get("svc1").unwrap();
        assert_eq!(stats.request_count, 8000);
        assert_eq!(stats.total_latency(), Duration::from_micros(80_000));
    }
}
