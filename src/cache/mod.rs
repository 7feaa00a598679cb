//! Caching subsystem.
//!
//! Three cache shapes, all constructed once by the
//! [`Kube9Builder`](crate::Kube9Builder) and injected into the components
//! that use them:
//!
//! - [`ResourceCache`]: generic key → (value, capture instant, TTL) store
//!   for resource listings. Keys follow [`ResourceKey`].
//!
//! - [`DetectionCache`]: one [`CachedDetectionStatus`] per context, per
//!   detected feature. Minutes-scale TTL.
//!
//! - [`ListCache`]: one inventory per context. Seconds-scale TTL, because
//!   inventories change far more often than install/absence.
//!
//! None of them refreshes itself on mutation. Whoever mutates cluster state
//! must invalidate the affected context explicitly.

pub mod context;
pub mod resource;

pub use context::{ContextCache, Stamped};
pub use resource::{CacheEntry, ResourceCache, ResourceKey};

use std::time::Duration;

use crate::detection::DetectionStatus;

/// Default detection cache TTL (5 minutes).
pub const DEFAULT_DETECTION_TTL: Duration = Duration::from_secs(5 * 60);

/// Default inventory cache TTL (30 seconds).
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(30);

/// Detection verdicts, keyed by context.
pub type DetectionCache = ContextCache<DetectionStatus>;

/// A detection verdict plus its capture instant.
pub type CachedDetectionStatus = Stamped<DetectionStatus>;

/// Managed-resource inventories, keyed by context.
pub type ListCache<T> = ContextCache<Vec<T>>;

/// Configuration shared by every cache shape.
///
/// ```rust
/// # use kube9_core::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(60))
///     .max_entries(5_000);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Freshness window. Default: 30 seconds.
    pub ttl: Duration,
    /// Optional entry cap. `None` (the default) retains every entry until
    /// it is overwritten or invalidated; `Some(n)` evicts the
    /// least-recently-used entries beyond `n`.
    pub max_entries: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_LIST_TTL,
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cap the number of entries (LRU eviction beyond the cap).
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }
}
