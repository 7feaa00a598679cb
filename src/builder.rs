//! Builder wiring collaborators, caches and services into a [`Kube9Core`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::argocd::ApplicationService;
use crate::cache::{
    CacheConfig, ContextCache, DEFAULT_DETECTION_TTL, DetectionCache, ListCache, ResourceCache,
};
use crate::config::Config;
use crate::detection::{
    DetectionClient, DirectProber, FeatureSpec, OperatorStatusSource, Prober, StatusSource,
};
use crate::operation::{OperationTracker, TrackerConfig};
use crate::operator::{DEFAULT_STALENESS, OperatorStatusClient, StatusLocation};
use crate::resources::{ListingTtls, ResourceClient, ResourceLister};
use crate::Result;

/// Main entry point for assembling a [`Kube9Core`].
pub struct Kube9;

impl Kube9 {
    /// Create a new builder.
    pub fn builder() -> Kube9Builder {
        Kube9Builder::new()
    }
}

/// Builder for [`Kube9Core`].
///
/// Every cache is constructed exactly once in [`build`](Self::build) and
/// shared by `Arc` with the components that use it.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use kube9_core::{Kube9, resources::ResourceClient};
/// # fn client() -> Arc<dyn ResourceClient> { unimplemented!() }
/// let core = Kube9::builder()
///     .client(client())
///     .build()
///     .unwrap();
/// ```
pub struct Kube9Builder {
    client: Option<Arc<dyn ResourceClient>>,
    status_source: Option<Arc<dyn StatusSource>>,
    prober: Option<Arc<dyn Prober>>,
    detection_cache: CacheConfig,
    list_cache: CacheConfig,
    resource_cache: CacheConfig,
    listing_ttls: ListingTtls,
    tracker: TrackerConfig,
    operator_location: StatusLocation,
    operator_staleness: Duration,
    #[cfg(feature = "kube")]
    kubeconfig: Option<std::path::PathBuf>,
}

impl Kube9Builder {
    pub fn new() -> Self {
        Self {
            client: None,
            status_source: None,
            prober: None,
            detection_cache: CacheConfig::new().ttl(DEFAULT_DETECTION_TTL),
            list_cache: CacheConfig::new(),
            resource_cache: CacheConfig::new(),
            listing_ttls: ListingTtls::default(),
            tracker: TrackerConfig::default(),
            operator_location: StatusLocation::default(),
            operator_staleness: DEFAULT_STALENESS,
            #[cfg(feature = "kube")]
            kubeconfig: None,
        }
    }

    /// Apply a loaded [`Config`].
    pub fn config(mut self, config: &Config) -> Self {
        self.detection_cache = config.detection.cache_config();
        self.list_cache = config.lists.cache_config();
        self.resource_cache = config.resources.cache_config();
        self.listing_ttls = config.resources.listing_ttls();
        self.tracker = config.operations.tracker_config();
        self.operator_location = config.operator.location();
        self.operator_staleness = config.operator.staleness();
        #[cfg(feature = "kube")]
        if let Some(path) = &config.kubeconfig {
            self.kubeconfig = Some(path.clone());
        }
        self
    }

    /// Cluster access. Required unless the `kube` feature is enabled.
    pub fn client(mut self, client: Arc<dyn ResourceClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Kubeconfig file for the default [`KubeResourceClient`](crate::resources::KubeResourceClient).
    #[cfg(feature = "kube")]
    pub fn kubeconfig(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Privileged status source. Default: the operator status ConfigMap.
    pub fn status_source(mut self, source: Arc<dyn StatusSource>) -> Self {
        self.status_source = Some(source);
        self
    }

    /// Direct prober. Default: [`DirectProber`] over the client.
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Detection verdict cache (default TTL: 5 minutes).
    pub fn detection_cache(mut self, config: CacheConfig) -> Self {
        self.detection_cache = config;
        self
    }

    /// Inventory cache (default TTL: 30 seconds).
    pub fn list_cache(mut self, config: CacheConfig) -> Self {
        self.list_cache = config;
        self
    }

    /// Resource listing cache. Per-kind TTLs come from [`listing_ttls`](Self::listing_ttls).
    pub fn resource_cache(mut self, config: CacheConfig) -> Self {
        self.resource_cache = config;
        self
    }

    pub fn listing_ttls(mut self, ttls: ListingTtls) -> Self {
        self.listing_ttls = ttls;
        self
    }

    pub fn tracker(mut self, config: TrackerConfig) -> Self {
        self.tracker = config;
        self
    }

    pub fn operator_location(mut self, location: StatusLocation) -> Self {
        self.operator_location = location;
        self
    }

    pub fn operator_staleness(mut self, staleness: Duration) -> Self {
        self.operator_staleness = staleness;
        self
    }

    #[cfg(feature = "kube")]
    fn resolve_client(&mut self) -> Result<Arc<dyn ResourceClient>> {
        use crate::resources::KubeResourceClient;

        Ok(match (self.client.take(), self.kubeconfig.take()) {
            (Some(client), _) => client,
            (None, Some(path)) => KubeResourceClient::with_kubeconfig(path).into_shared(),
            (None, None) => KubeResourceClient::new().into_shared(),
        })
    }

    #[cfg(not(feature = "kube"))]
    fn resolve_client(&mut self) -> Result<Arc<dyn ResourceClient>> {
        self.client.take().ok_or_else(|| {
            crate::Kube9Error::Configuration("no resource client configured".to_string())
        })
    }

    /// Build the core.
    pub fn build(mut self) -> Result<Kube9Core> {
        let client = self.resolve_client()?;

        let source: Arc<dyn StatusSource> = match self.status_source.take() {
            Some(source) => source,
            None => Arc::new(OperatorStatusSource::new(
                client.clone(),
                self.operator_location.clone(),
            )),
        };
        let prober: Arc<dyn Prober> = match self.prober.take() {
            Some(prober) => prober,
            None => Arc::new(DirectProber::new(client.clone())),
        };

        let detection_cache: Arc<DetectionCache> =
            Arc::new(ContextCache::new("detection", &self.detection_cache));
        let list_cache: Arc<ListCache<_>> = Arc::new(ContextCache::new("list", &self.list_cache));
        let operator_cache = Arc::new(ContextCache::new("operator", &self.detection_cache));
        let resource_cache = Arc::new(ResourceCache::new(&self.resource_cache));

        let argocd_detection = Arc::new(DetectionClient::new(
            FeatureSpec::ARGOCD,
            source,
            prober,
            detection_cache,
        ));
        let tracker = OperationTracker::new(client.clone(), self.tracker);
        let applications = ApplicationService::new(
            client.clone(),
            argocd_detection.clone(),
            list_cache,
            tracker.clone(),
        );
        let operator = OperatorStatusClient::new(client.clone(), self.operator_location, operator_cache)
            .with_staleness(self.operator_staleness);
        let resources = ResourceLister::new(client.clone(), resource_cache, self.listing_ttls);

        debug!(client = client.name(), "kube9 core built");
        Ok(Kube9Core {
            client,
            operator,
            argocd_detection,
            applications,
            resources,
            tracker,
        })
    }
}

impl Default for Kube9Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembled caches and services for one process.
pub struct Kube9Core {
    client: Arc<dyn ResourceClient>,
    operator: OperatorStatusClient,
    argocd_detection: Arc<DetectionClient>,
    applications: ApplicationService,
    resources: ResourceLister,
    tracker: OperationTracker,
}

impl Kube9Core {
    pub fn client(&self) -> &Arc<dyn ResourceClient> {
        &self.client
    }

    pub fn operator(&self) -> &OperatorStatusClient {
        &self.operator
    }

    pub fn argocd_detection(&self) -> &DetectionClient {
        &self.argocd_detection
    }

    pub fn applications(&self) -> &ApplicationService {
        &self.applications
    }

    pub fn resources(&self) -> &ResourceLister {
        &self.resources
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// Drop everything cached for `context`, in every cache.
    pub fn invalidate_context(&self, context: &str) {
        self.operator.invalidate(context);
        self.applications.invalidate(context);
        self.resources.invalidate_context(context);
    }
}
