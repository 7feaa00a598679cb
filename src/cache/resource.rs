//! Generic TTL resource cache.
//!
//! [`ResourceCache`] maps an opaque string key (see [`ResourceKey`]) to a
//! value plus the instant it was captured and the TTL it was stored with.
//! Freshness is computed lazily at read time: there is no sweeper, and a
//! stale entry stays in memory until it is overwritten, invalidated, or
//! evicted by the optional LRU bound.
//!
//! Retaining stale entries is what lets callers fall back to the last known
//! value through [`ResourceCache::get_stale`] when the backend is down.
//!
//! # Concurrency
//!
//! Backed by moka's `sync::Cache`, so reads and writes never suspend and are
//! safe from any number of tasks. Writes to the same key are
//! last-writer-wins; concurrent misses for one key are not coalesced.

use std::fmt;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tokio::time::Instant;

use super::CacheConfig;
use crate::telemetry;

/// A cached value with its capture time.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached payload.
    pub value: V,
    /// Monotonic capture time.
    pub cached_at: Instant,
    /// Freshness window the value was stored with.
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Fresh iff `now - cached_at < ttl`.
    pub fn is_fresh(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Cache key builder: `context:kind[:namespace][:selector]`.
///
/// ```rust
/// # use kube9_core::cache::ResourceKey;
/// let key = ResourceKey::new("prod", "pods").namespace("web").selector("app=api");
/// assert_eq!(key.to_string(), "prod:pods:web:app=api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    context: String,
    kind: String,
    namespace: Option<String>,
    selector: Option<String>,
}

impl ResourceKey {
    pub fn new(context: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            kind: kind.into(),
            namespace: None,
            selector: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the namespace if one is given (`None` = all namespaces).
    pub fn maybe_namespace(mut self, namespace: Option<&str>) -> Self {
        self.namespace = namespace.map(str::to_owned);
        self
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn maybe_selector(mut self, selector: Option<&str>) -> Self {
        self.selector = selector.map(str::to_owned);
        self
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.context, self.kind)?;
        match (&self.namespace, &self.selector) {
            (Some(ns), Some(sel)) => write!(f, ":{ns}:{sel}"),
            (Some(ns), None) => write!(f, ":{ns}"),
            // Keep the selector in the fourth segment so an all-namespaces
            // listing never collides with a namespace named like the selector.
            (None, Some(sel)) => write!(f, "::{sel}"),
            (None, None) => Ok(()),
        }
    }
}

/// Process-wide TTL cache for cluster resources.
///
/// Construct once at startup and share by `Arc`. See module docs for the
/// staleness and concurrency model.
pub struct ResourceCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V> ResourceCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache from the given configuration.
    ///
    /// With `max_entries` unset the cache is unbounded. With a bound,
    /// least-recently-used entries are evicted once the cap is exceeded.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = match config.max_entries {
            Some(max) => Cache::builder()
                .max_capacity(max)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            None => Cache::builder().build(),
        };
        Self {
            entries,
            default_ttl: config.ttl,
        }
    }

    /// Return the value for `key` iff it exists and is fresh.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh() => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => "resource").increment(1);
                Some(entry.value)
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => "resource")
                    .increment(1);
                None
            }
        }
    }

    /// Return the retained value for `key` regardless of age.
    ///
    /// Only for error fallbacks; ordinary reads go through [`get`](Self::get).
    pub fn get_stale(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value)
    }

    /// Unconditionally store `value` under `key`, starting a new freshness window.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(key.into(), CacheEntry::new(value, ttl));
    }

    /// Store with the cache's default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove one entry. Removing an absent key is a no-op.
    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();
        for key in doomed {
            self.entries.invalidate(&key);
        }
    }

    /// Remove every entry belonging to `context`.
    ///
    /// Matches keys equal to `context` or starting with `context:`. Context
    /// names may themselves contain `:` (EKS ARNs), so invalidating `a` also
    /// drops entries of a context named `a:b`. That only costs a refetch.
    pub fn invalidate_context(&self, context: &str) {
        self.entries.invalidate(context);
        self.invalidate_prefix(&format!("{context}:"));
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of retained entries, fresh or stale.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
