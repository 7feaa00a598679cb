//! Cached high-frequency resource listings.
//!
//! [`ResourceLister`] answers "list kind K in context C" from the shared
//! [`ResourceCache`] when fresh, otherwise from the [`ResourceClient`].
//! A failed fetch serves the last cached listing (even stale) if there is
//! one, and an empty listing otherwise. It never returns an error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::{ResourceClient, ResourceKind};
use crate::Kube9Error;
use crate::cache::{ResourceCache, ResourceKey};
use crate::error::ErrorKind;
use crate::telemetry;

/// Per-kind TTLs for listings.
///
/// Nodes churn slowly, so they get a longer window by default.
#[derive(Debug, Clone)]
pub struct ListingTtls {
    /// TTL for nodes. Default: 60 seconds.
    pub nodes: Duration,
    /// TTL for every other kind. Default: 30 seconds.
    pub default: Duration,
}

impl Default for ListingTtls {
    fn default() -> Self {
        Self {
            nodes: Duration::from_secs(60),
            default: Duration::from_secs(30),
        }
    }
}

impl ListingTtls {
    pub fn for_kind(&self, kind: &ResourceKind) -> Duration {
        if *kind == ResourceKind::NODE {
            self.nodes
        } else {
            self.default
        }
    }
}

/// Cached listings over a [`ResourceClient`].
pub struct ResourceLister {
    client: Arc<dyn ResourceClient>,
    cache: Arc<ResourceCache<Vec<Value>>>,
    ttls: ListingTtls,
}

impl ResourceLister {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        cache: Arc<ResourceCache<Vec<Value>>>,
        ttls: ListingTtls,
    ) -> Self {
        Self {
            client,
            cache,
            ttls,
        }
    }

    /// List `kind` in `context`.
    ///
    /// `namespace = None` lists across all namespaces. With `bypass_cache`
    /// the backend is always queried and the cache overwritten.
    #[instrument(skip(self, kind), fields(kind = kind.plural))]
    pub async fn list(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        selector: Option<&str>,
        bypass_cache: bool,
    ) -> Vec<Value> {
        let key = ResourceKey::new(context, kind.plural)
            .maybe_namespace(namespace)
            .maybe_selector(selector)
            .to_string();

        if !bypass_cache && let Some(items) = self.cache.get(&key) {
            return items;
        }

        match self.client.list(context, kind, namespace, selector).await {
            Ok(items) => {
                debug!(context, count = items.len(), "fetched listing");
                self.cache.set(key, items.clone(), self.ttls.for_kind(kind));
                items
            }
            Err(e) => self.fallback(context, &key, e),
        }
    }

    pub async fn nodes(&self, context: &str, bypass_cache: bool) -> Vec<Value> {
        self.list(context, &ResourceKind::NODE, None, None, bypass_cache)
            .await
    }

    pub async fn pods(
        &self,
        context: &str,
        namespace: Option<&str>,
        bypass_cache: bool,
    ) -> Vec<Value> {
        self.list(context, &ResourceKind::POD, namespace, None, bypass_cache)
            .await
    }

    pub async fn services(
        &self,
        context: &str,
        namespace: Option<&str>,
        bypass_cache: bool,
    ) -> Vec<Value> {
        self.list(context, &ResourceKind::SERVICE, namespace, None, bypass_cache)
            .await
    }

    pub async fn deployments(
        &self,
        context: &str,
        namespace: Option<&str>,
        bypass_cache: bool,
    ) -> Vec<Value> {
        self.list(context, &ResourceKind::DEPLOYMENT, namespace, None, bypass_cache)
            .await
    }

    /// Drop every cached listing of `context`.
    pub fn invalidate_context(&self, context: &str) {
        self.cache.invalidate_context(context);
    }

    fn fallback(&self, context: &str, key: &str, err: Kube9Error) -> Vec<Value> {
        let kind = err.kind();
        if let Some(items) = self.cache.get_stale(key) {
            warn!(context, key, error = %err, "listing failed, serving stale cache");
            metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL,
                "cache" => "resource",
                "reason" => kind.as_str(),
            )
            .increment(1);
            return items;
        }
        match kind {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                warn!(context, key, error = %err, "listing unavailable, returning empty");
            }
            _ => {
                error!(context, key, error = ?err, "listing failed, returning empty");
            }
        }
        Vec::new()
    }
}
