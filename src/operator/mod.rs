//! Operator presence and cluster mode.
//!
//! The kube9 operator is optional. When it runs, it publishes a status
//! document (see [`status`]) from which the cluster's [`ClusterMode`] is
//! derived. [`OperatorStatusClient`] caches the result per context.

pub mod status;

pub use status::{
    FeatureSection, OperatorHealth, OperatorStatus, StatusLocation, read_status,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::cache::ContextCache;
use crate::resources::ResourceClient;
use crate::telemetry;

/// Status documents older than this put the cluster in [`ClusterMode::Degraded`].
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(5 * 60);

/// What the extension may offer in a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// No operator, or its status could not be read.
    Basic,
    /// Operator present, free tier.
    Operated,
    /// Operator present and registered on the pro tier.
    Enabled,
    /// Operator present but unhealthy or not reporting.
    Degraded,
}

impl ClusterMode {
    /// Derive the mode from a status document observed at `now`.
    pub fn from_status(
        status: Option<&OperatorStatus>,
        staleness: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(status) = status else {
            return ClusterMode::Basic;
        };

        let age = now.signed_duration_since(status.last_update);
        let stale = chrono::Duration::from_std(staleness)
            .map(|limit| age > limit)
            .unwrap_or(false);
        if stale || status.health != OperatorHealth::Healthy || status.error.is_some() {
            return ClusterMode::Degraded;
        }

        if status.registered && status.tier.as_deref() == Some("pro") {
            ClusterMode::Enabled
        } else {
            ClusterMode::Operated
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterMode::Basic => "basic",
            ClusterMode::Operated => "operated",
            ClusterMode::Enabled => "enabled",
            ClusterMode::Degraded => "degraded",
        }
    }
}

/// Operator status plus the derived mode, as cached per context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedOperatorStatus {
    pub mode: ClusterMode,
    /// `None` when no operator status is available.
    pub status: Option<OperatorStatus>,
    pub checked_at: DateTime<Utc>,
}

impl CachedOperatorStatus {
    fn basic() -> Self {
        Self {
            mode: ClusterMode::Basic,
            status: None,
            checked_at: Utc::now(),
        }
    }
}

/// Reads and caches the operator status per context. Never fails.
pub struct OperatorStatusClient {
    client: Arc<dyn ResourceClient>,
    location: StatusLocation,
    cache: Arc<ContextCache<CachedOperatorStatus>>,
    staleness: Duration,
}

impl OperatorStatusClient {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        location: StatusLocation,
        cache: Arc<ContextCache<CachedOperatorStatus>>,
    ) -> Self {
        Self {
            client,
            location,
            cache,
            staleness: DEFAULT_STALENESS,
        }
    }

    /// Override the age after which a status document counts as stale.
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn location(&self) -> &StatusLocation {
        &self.location
    }

    /// Operator status for `context`.
    ///
    /// A missing ConfigMap yields [`ClusterMode::Basic`]. A read failure
    /// serves the last cached status (even stale), else `Basic`; both are
    /// cached so a broken cluster is not re-queried on every call.
    #[instrument(skip(self))]
    pub async fn get_status(&self, context: &str, bypass_cache: bool) -> CachedOperatorStatus {
        if !bypass_cache && let Some(cached) = self.cache.get(context) {
            return cached;
        }

        let result = match read_status(self.client.as_ref(), context, &self.location).await {
            Ok(status) => {
                let mode = ClusterMode::from_status(status.as_ref(), self.staleness, Utc::now());
                debug!(context, mode = mode.as_str(), "operator status read");
                CachedOperatorStatus {
                    mode,
                    status,
                    checked_at: Utc::now(),
                }
            }
            Err(e) => {
                if let Some(stale) = self.cache.get_stale(context) {
                    warn!(context, error = %e, "operator status unavailable, serving stale cache");
                    metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL,
                        "cache" => "operator",
                        "reason" => e.kind().as_str(),
                    )
                    .increment(1);
                    return stale;
                }
                warn!(context, error = %e, "operator status unavailable, assuming basic mode");
                CachedOperatorStatus::basic()
            }
        };

        self.cache.insert(context, result.clone());
        result
    }

    /// Shorthand for the mode of [`get_status`](Self::get_status).
    pub async fn mode(&self, context: &str) -> ClusterMode {
        self.get_status(context, false).await.mode
    }

    pub fn invalidate(&self, context: &str) {
        self.cache.invalidate(context);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
