//! Cached two-tier detection of a single feature.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, instrument, warn};

use super::{DetectionMethod, DetectionStatus, FeatureReport, FeatureSpec, Prober, StatusSource};
use crate::Kube9Error;
use crate::cache::DetectionCache;
use crate::error::ErrorKind;
use crate::telemetry;

/// Answers "is this feature installed, and where?" per context.
///
/// Verdicts, positive and negative, are cached for the cache's TTL.
/// [`is_installed`](Self::is_installed) never fails.
pub struct DetectionClient {
    feature: FeatureSpec,
    source: Arc<dyn StatusSource>,
    prober: Arc<dyn Prober>,
    cache: Arc<DetectionCache>,
}

impl DetectionClient {
    pub fn new(
        feature: FeatureSpec,
        source: Arc<dyn StatusSource>,
        prober: Arc<dyn Prober>,
        cache: Arc<DetectionCache>,
    ) -> Self {
        Self {
            feature,
            source,
            prober,
            cache,
        }
    }

    pub fn feature(&self) -> &FeatureSpec {
        &self.feature
    }

    /// Detection verdict for `context`.
    ///
    /// A fresh cached verdict is returned as is unless `bypass_cache`. A
    /// verdict from the privileged source is final. When the source is
    /// silent or failing the prober decides; when that fails too, the last
    /// cached verdict (even stale) is served, else a negative one.
    #[instrument(skip(self), fields(feature = self.feature.name))]
    pub async fn is_installed(&self, context: &str, bypass_cache: bool) -> DetectionStatus {
        if !bypass_cache && let Some(cached) = self.cache.get(context) {
            return cached;
        }

        match self.source.feature_status(context, self.feature.name).await {
            Ok(FeatureReport::Detected { namespace, version }) => {
                let namespace =
                    namespace.or_else(|| Some(self.feature.default_namespace.to_string()));
                let status =
                    DetectionStatus::installed(DetectionMethod::PrivilegedSource, namespace, version);
                return self.record(context, status);
            }
            Ok(FeatureReport::NotDetected) => {
                let status = DetectionStatus::not_installed(DetectionMethod::PrivilegedSource);
                return self.record(context, status);
            }
            Ok(FeatureReport::NoOpinion) => {
                debug!(context, source = self.source.name(), "no privileged opinion, probing");
            }
            Err(e) => self.log_source_error(context, &e),
        }

        match self.prober.probe(context, &self.feature).await {
            Ok(status) => self.record(context, status),
            Err(e) => self.fallback(context, e),
        }
    }

    /// Fresh cached verdict for `context`, without any I/O.
    pub fn cached(&self, context: &str) -> Option<DetectionStatus> {
        self.cache.get(context)
    }

    /// Forget the verdict for `context`. Idempotent.
    pub fn invalidate(&self, context: &str) {
        self.cache.invalidate(context);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Run [`is_installed`](Self::is_installed) for several contexts concurrently.
    ///
    /// Results are returned in input order.
    pub async fn check_contexts<I, S>(
        &self,
        contexts: I,
        bypass_cache: bool,
    ) -> Vec<(String, DetectionStatus)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let contexts: Vec<String> = contexts.into_iter().map(Into::into).collect();
        let checks = contexts
            .iter()
            .map(|context| self.is_installed(context, bypass_cache));
        let statuses = join_all(checks).await;
        contexts.into_iter().zip(statuses).collect()
    }

    fn record(&self, context: &str, status: DetectionStatus) -> DetectionStatus {
        metrics::counter!(telemetry::DETECTIONS_TOTAL,
            "feature" => self.feature.name,
            "method" => status.detection_method.as_str(),
            "installed" => if status.installed { "true" } else { "false" },
        )
        .increment(1);
        self.cache.insert(context, status.clone());
        status
    }

    fn fallback(&self, context: &str, err: Kube9Error) -> DetectionStatus {
        if let Some(stale) = self.cache.get_stale(context) {
            warn!(context, error = %err, "detection failed, serving stale verdict");
            metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL,
                "cache" => "detection",
                "reason" => err.kind().as_str(),
            )
            .increment(1);
            return stale;
        }
        warn!(context, error = %err, "detection failed, assuming not installed");
        self.record(
            context,
            DetectionStatus::not_installed(DetectionMethod::DirectProbe),
        )
    }

    fn log_source_error(&self, context: &str, err: &Kube9Error) {
        let source = self.source.name();
        match err.kind() {
            ErrorKind::PermissionDenied => {
                warn!(context, source, error = %err, "privileged source not readable, probing");
            }
            ErrorKind::Unknown => {
                error!(context, source, error = ?err, "privileged source failed, probing");
            }
            _ => {
                error!(context, source, error = %err, "privileged source failed, probing");
            }
        }
    }
}
