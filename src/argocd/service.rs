//! Application inventory and mutations.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, error, info, instrument, warn};

use super::Application;
use crate::cache::ListCache;
use crate::detection::{DetectionClient, DetectionStatus};
use crate::error::ErrorKind;
use crate::operation::{OperationResult, OperationTracker};
use crate::resources::{ResourceClient, ResourceKind};
use crate::telemetry;
use crate::{Kube9Error, Result};

/// Annotation ArgoCD watches for refresh requests.
pub const REFRESH_ANNOTATION: &str = "argocd.argoproj.io/refresh";

/// Options for a sync operation.
///
/// ```rust
/// # use kube9_core::argocd::SyncOptions;
/// let options = SyncOptions::new().prune(true).revision("v1.4.0");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Revision to sync to. Default: the application's target revision.
    pub revision: Option<String>,
    pub prune: bool,
    pub dry_run: bool,
    /// Raw ArgoCD sync options such as `CreateNamespace=true`.
    pub sync_options: Vec<String>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.sync_options.push(option.into());
        self
    }

    fn to_patch(&self) -> Value {
        let mut sync = json!({
            "prune": self.prune,
            "dryRun": self.dry_run,
        });
        if let Some(revision) = &self.revision {
            sync["revision"] = json!(revision);
        }
        if !self.sync_options.is_empty() {
            sync["syncOptions"] = json!(self.sync_options);
        }
        json!({
            "operation": {
                "initiatedBy": {"username": "kube9"},
                "sync": sync,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Sync,
    Refresh,
    HardRefresh,
}

impl Mutation {
    fn as_str(self) -> &'static str {
        match self {
            Mutation::Sync => "sync",
            Mutation::Refresh => "refresh",
            Mutation::HardRefresh => "hard_refresh",
        }
    }
}

/// ArgoCD applications of a context, cached behind detection.
pub struct ApplicationService {
    client: Arc<dyn ResourceClient>,
    detection: Arc<DetectionClient>,
    cache: Arc<ListCache<Application>>,
    tracker: OperationTracker,
}

impl ApplicationService {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        detection: Arc<DetectionClient>,
        cache: Arc<ListCache<Application>>,
        tracker: OperationTracker,
    ) -> Self {
        Self {
            client,
            detection,
            cache,
            tracker,
        }
    }

    /// Whether ArgoCD is installed in `context`.
    pub async fn is_installed(&self, context: &str, bypass_cache: bool) -> DetectionStatus {
        self.detection.is_installed(context, bypass_cache).await
    }

    /// All applications in `context`, across namespaces.
    ///
    /// Returns `[]` without touching the list cache when ArgoCD is not
    /// installed. Malformed items are skipped individually. A failed fetch
    /// serves the last cached inventory (even stale), else `[]`.
    #[instrument(skip(self))]
    pub async fn get_applications(&self, context: &str, bypass_cache: bool) -> Vec<Application> {
        if !self.detection.is_installed(context, false).await.installed {
            debug!(context, "argocd not installed, no applications");
            return Vec::new();
        }

        if !bypass_cache && let Some(apps) = self.cache.get(context) {
            return apps;
        }

        match self
            .client
            .list(context, &ResourceKind::ARGO_APPLICATION, None, None)
            .await
        {
            Ok(items) => {
                let apps = parse_applications(context, &items);
                debug!(context, count = apps.len(), skipped = items.len() - apps.len(), "fetched applications");
                self.cache.insert(context, apps.clone());
                apps
            }
            Err(e) => self.fallback(context, e),
        }
    }

    /// Live lookup of one application.
    ///
    /// Unlike [`get_applications`](Self::get_applications) this returns
    /// errors, including [`NotFound`](Kube9Error::NotFound).
    #[instrument(skip(self))]
    pub async fn get_application(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Application> {
        let raw = self
            .client
            .get(context, &ResourceKind::ARGO_APPLICATION, Some(namespace), name)
            .await?;
        Application::from_object(&raw)
    }

    /// Start a sync of `namespace/name`.
    pub async fn sync(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
        options: &SyncOptions,
    ) -> Result<Application> {
        self.mutate(context, namespace, name, Mutation::Sync, options.to_patch())
            .await
    }

    /// Ask ArgoCD to re-read the application's source.
    pub async fn refresh(&self, context: &str, namespace: &str, name: &str) -> Result<Application> {
        self.mutate(context, namespace, name, Mutation::Refresh, refresh_patch("normal"))
            .await
    }

    /// Ask ArgoCD to re-read the source, bypassing its manifest cache.
    pub async fn hard_refresh(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Application> {
        self.mutate(context, namespace, name, Mutation::HardRefresh, refresh_patch("hard"))
            .await
    }

    /// Sync, then follow the operation until it settles.
    ///
    /// The state of the sync that ran before this one is never reported.
    pub async fn sync_and_track(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
        options: &SyncOptions,
    ) -> Result<OperationResult> {
        let patched = self.sync(context, namespace, name, options).await?;
        let previous_start = patched.operation_state.and_then(|s| s.started_at);
        let result = self
            .tracker
            .track_application_after(context, namespace, name, previous_start)
            .await;
        self.invalidate(context);
        result
    }

    /// Drop the cached detection verdict and inventory of `context`.
    pub fn invalidate(&self, context: &str) {
        self.detection.invalidate(context);
        self.cache.invalidate(context);
    }

    /// Fresh cached inventory for `context`, without any I/O.
    pub fn cached(&self, context: &str) -> Option<Vec<Application>> {
        self.cache.get(context)
    }

    #[instrument(skip(self, action, patch), fields(action = action.as_str()))]
    async fn mutate(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
        action: Mutation,
        patch: Value,
    ) -> Result<Application> {
        let outcome = self
            .client
            .patch(
                context,
                &ResourceKind::ARGO_APPLICATION,
                Some(namespace),
                name,
                &patch,
            )
            .await;

        let status = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::MUTATIONS_TOTAL,
            "action" => action.as_str(),
            "status" => status,
        )
        .increment(1);

        let updated = match outcome {
            Ok(updated) => updated,
            Err(e) => {
                warn!(context, namespace, name, error = %e, "mutation failed");
                return Err(e);
            }
        };

        self.invalidate(context);
        info!(context, namespace, name, "mutation accepted");
        Application::from_object(&updated)
    }

    fn fallback(&self, context: &str, err: Kube9Error) -> Vec<Application> {
        let kind = err.kind();
        if let Some(apps) = self.cache.get_stale(context) {
            warn!(context, error = %err, "listing applications failed, serving stale cache");
            metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL,
                "cache" => "list",
                "reason" => kind.as_str(),
            )
            .increment(1);
            return apps;
        }
        match kind {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                warn!(context, error = %err, "applications unavailable, returning empty");
            }
            _ => {
                error!(context, error = ?err, "listing applications failed, returning empty");
            }
        }
        Vec::new()
    }
}

fn refresh_patch(mode: &str) -> Value {
    let mut annotations = Map::new();
    annotations.insert(REFRESH_ANNOTATION.to_string(), Value::from(mode));
    json!({ "metadata": { "annotations": annotations } })
}

/// Parse raw items one by one, skipping the malformed ones.
pub(crate) fn parse_applications(context: &str, items: &[Value]) -> Vec<Application> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match Application::from_object(raw) {
            Ok(app) => Some(app),
            Err(e) => {
                warn!(context, index, error = %e, "skipping malformed application");
                metrics::counter!(telemetry::PARSE_SKIPPED_TOTAL, "kind" => "Application")
                    .increment(1);
                None
            }
        })
        .collect()
}
