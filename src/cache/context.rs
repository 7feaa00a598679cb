//! Per-context caches for detection verdicts and inventories.
//!
//! A [`ContextCache`] holds at most one value per cluster context, stamped
//! with its capture instant. It backs two tiers that differ only in TTL:
//!
//! - detection verdicts ([`DetectionCache`]), minutes;
//! - managed-resource inventories ([`ListCache`]), tens of seconds.
//!
//! Like [`ResourceCache`](super::ResourceCache), staleness is evaluated at
//! read time and stale values are retained for error fallbacks.

use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tokio::time::Instant;

use super::CacheConfig;
use crate::telemetry;

/// A value with the monotonic instant it was cached at.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    pub value: T,
    pub timestamp: Instant,
}

impl<T> Stamped<T> {
    pub fn now(value: T) -> Self {
        Self {
            value,
            timestamp: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

/// One cached value per context, evaluated against a single TTL.
pub struct ContextCache<T> {
    name: &'static str,
    entries: Cache<String, Stamped<T>>,
    ttl: Duration,
}

impl<T> ContextCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cache. `name` labels the cache hit/miss metrics.
    pub fn new(name: &'static str, config: &CacheConfig) -> Self {
        let entries = match config.max_entries {
            Some(max) => Cache::builder()
                .max_capacity(max)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            None => Cache::builder().build(),
        };
        Self {
            name,
            entries,
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `context`, or `None`.
    pub fn get(&self, context: &str) -> Option<T> {
        match self.entries.get(context) {
            Some(stamped) if stamped.is_fresh(self.ttl) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
                Some(stamped.value)
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name)
                    .increment(1);
                None
            }
        }
    }

    /// Last value for `context` regardless of age.
    pub fn get_stale(&self, context: &str) -> Option<T> {
        self.entries.get(context).map(|stamped| stamped.value)
    }

    /// Overwrite the value for `context`, restarting its freshness window.
    pub fn insert(&self, context: &str, value: T) {
        self.entries.insert(context.to_owned(), Stamped::now(value));
    }

    /// Drop the value for `context`. Idempotent.
    pub fn invalidate(&self, context: &str) {
        self.entries.invalidate(context);
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
