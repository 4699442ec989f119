//! # Filter Staging Cache
//!
//! The event-stream transport carries no request body, so a client stages
//! its filter here first and opens streams with the returned token.
//!
//! - Tokens are random UUIDv4 strings
//! - An entry resolves while `now - created_at <= FILTER_TTL_MS`
//! - Expired entries are evicted on failed lookup, or by [`sweep_expired`]
//!
//! [`sweep_expired`]: FilterStagingCache::sweep_expired

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::observability::{log_event_at, Event, MetricsRegistry, Severity};
use crate::records::OrderFilter;

/// Lifetime of a staged filter, measured from staging
pub const FILTER_TTL_MS: i64 = 300_000;

/// Leading characters of a token that may appear in logs
const LOGGED_TOKEN_CHARS: usize = 8;

/// Short, log-safe form of a token. The full token grants a session.
pub fn token_prefix(token: &str) -> &str {
    token
        .char_indices()
        .nth(LOGGED_TOKEN_CHARS)
        .map(|(end, _)| &token[..end])
        .unwrap_or(token)
}

/// A filter staged behind a token
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFilter {
    pub token: String,
    pub payload: OrderFilter,
    pub created_at: DateTime<Utc>,
}

impl StagedFilter {
    /// True once the TTL has strictly elapsed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::milliseconds(FILTER_TTL_MS)
    }
}

/// Concurrent token -> staged filter map
#[derive(Debug)]
pub struct FilterStagingCache {
    entries: RwLock<HashMap<String, StagedFilter>>,
    metrics: Arc<MetricsRegistry>,
}

impl Default for FilterStagingCache {
    fn default() -> Self {
        Self::new(Arc::new(MetricsRegistry::new()))
    }
}

impl FilterStagingCache {
    /// Create an empty cache
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Stage `filter` and return its token
    pub fn stage(&self, filter: OrderFilter) -> String {
        self.stage_at(filter, Utc::now())
    }

    /// Stage `filter` as if at `now`
    pub fn stage_at(&self, filter: OrderFilter, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().to_string();
        let entry = StagedFilter {
            token: token.clone(),
            payload: filter,
            created_at: now,
        };

        self.write_entries().insert(token.clone(), entry);

        self.metrics.increment_filters_staged();
        token
    }

    /// Look up a staged filter.
    ///
    /// `None` covers both "never staged" and "expired".
    pub fn resolve(&self, token: &str) -> Option<OrderFilter> {
        self.resolve_at(token, Utc::now())
    }

    /// Look up a staged filter as if at `now`
    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Option<OrderFilter> {
        {
            let entries = self.read_entries();
            let entry = entries.get(token)?;
            if !entry.is_expired_at(now) {
                return Some(entry.payload.clone());
            }
        }

        // Expired: evict lazily, re-checking under the write lock
        let mut entries = self.write_entries();
        let still_expired = entries
            .get(token)
            .map(|e| e.is_expired_at(now))
            .unwrap_or(false);
        if still_expired {
            entries.remove(token);
            self.metrics.add_staged_filters_evicted(1);
        }
        None
    }

    /// Remove every entry expired at `now`; returns how many were removed
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        let removed = before - entries.len();
        self.metrics.add_staged_filters_evicted(removed as u64);
        removed
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every mutation is a single insert or remove, so a map left behind by
    // a panicking holder is still consistent and the lock is recovered.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, StagedFilter>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, StagedFilter>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the
    /// returned task is aborted.
    pub fn spawn_sweeper(cache: Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired(Utc::now());
                if removed > 0 {
                    log_event_at(
                        Severity::Debug,
                        Event::StagingSwept,
                        &[("removed", &removed.to_string())],
                    );
                }
            }
        })
    }
}
