//! Counters for the sync service
//!
//! - Counters only, monotonic, reset on process start
//! - Relaxed atomics: values are diagnostics, not synchronization

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of operational counters, shared by the server components.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    filters_staged: AtomicU64,
    staged_filters_evicted: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_rejected: AtomicU64,
    sessions_closed: AtomicU64,
    recomputes_started: AtomicU64,
    recomputes_superseded: AtomicU64,
    recomputes_failed: AtomicU64,
    results_delivered: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_filters_staged(&self) {
        self.filters_staged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_staged_filters_evicted(&self, count: u64) {
        self.staged_filters_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_sessions_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sessions_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sessions_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recomputes_started(&self) {
        self.recomputes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recomputes_superseded(&self) {
        self.recomputes_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recomputes_failed(&self) {
        self.recomputes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_results_delivered(&self) {
        self.results_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of sessions currently streaming
    pub fn active_sessions(&self) -> u64 {
        let opened = self.sessions_opened.load(Ordering::Relaxed);
        let closed = self.sessions_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            filters_staged: self.filters_staged.load(Ordering::Relaxed),
            staged_filters_evicted: self.staged_filters_evicted.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions(),
            recomputes_started: self.recomputes_started.load(Ordering::Relaxed),
            recomputes_superseded: self.recomputes_superseded.load(Ordering::Relaxed),
            recomputes_failed: self.recomputes_failed.load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
        }
    }

    /// Snapshot rendered as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub filters_staged: u64,
    pub staged_filters_evicted: u64,
    pub sessions_opened: u64,
    pub sessions_rejected: u64,
    pub sessions_closed: u64,
    pub active_sessions: u64,
    pub recomputes_started: u64,
    pub recomputes_superseded: u64,
    pub recomputes_failed: u64,
    pub results_delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.filters_staged, 0);
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.results_delivered, 0);
    }

    #[test]
    fn test_active_sessions() {
        let registry = MetricsRegistry::new();
        registry.increment_sessions_opened();
        registry.increment_sessions_opened();
        registry.increment_sessions_closed();
        assert_eq!(registry.active_sessions(), 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_filters_staged();
        registry.add_staged_filters_evicted(3);

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["filters_staged"], 1);
        assert_eq!(parsed["staged_filters_evicted"], 3);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_recomputes_started();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().recomputes_started, 800);
    }
}
