//! Direct detection: infer a feature from cluster objects.
//!
//! 1. The feature's CRD must exist; a `NotFound` is a negative verdict.
//! 2. The representative workload is found by label selector across all
//!    namespaces. Candidates are ordered by creation time (oldest first,
//!    then namespace, then name), so the pick does not depend on the order
//!    the API server returns them in.
//! 3. Version comes from the workload's version label, else from the first
//!    container's image tag.

use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{DetectionMethod, DetectionStatus, FeatureSpec, Prober};
use crate::error::ErrorKind;
use crate::resources::{ObjectMeta, ResourceClient, ResourceKind};
use crate::{Kube9Error, Result};

static SEMVER_TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.\d+\.\d+").expect("static regex is valid")
});

/// Probes CRDs and workloads through a [`ResourceClient`].
pub struct DirectProber {
    client: Arc<dyn ResourceClient>,
}

impl DirectProber {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for DirectProber {
    fn name(&self) -> &str {
        "direct"
    }

    async fn probe(&self, context: &str, feature: &FeatureSpec) -> Result<DetectionStatus> {
        match self
            .client
            .get(
                context,
                &ResourceKind::CUSTOM_RESOURCE_DEFINITION,
                None,
                feature.crd_name,
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(context, feature = feature.name, crd = feature.crd_name, "CRD absent");
                return Ok(DetectionStatus::not_installed(DetectionMethod::DirectProbe));
            }
            Err(e) => {
                log_probe_error(context, feature, "crd", &e);
                return Err(e);
            }
        }

        let candidates = match self
            .client
            .list(
                context,
                &feature.workload_kind,
                None,
                Some(feature.workload_selector),
            )
            .await
        {
            Ok(items) => items,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                log_probe_error(context, feature, "workload", &e);
                return Err(e);
            }
        };

        let Some(workload) = select_workload(&candidates) else {
            debug!(
                context,
                feature = feature.name,
                "CRD present but no workload matched, assuming default namespace"
            );
            return Ok(DetectionStatus::installed(
                DetectionMethod::DirectProbe,
                Some(feature.default_namespace.to_string()),
                None,
            ));
        };

        let namespace = workload
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| feature.default_namespace.to_string());
        let version = workload.version(feature.version_label);
        debug!(context, feature = feature.name, %namespace, ?version, "detected by probe");
        Ok(DetectionStatus::installed(
            DetectionMethod::DirectProbe,
            Some(namespace),
            version,
        ))
    }
}

fn log_probe_error(context: &str, feature: &FeatureSpec, step: &str, err: &Kube9Error) {
    match err.kind() {
        ErrorKind::PermissionDenied => {
            warn!(context, feature = feature.name, step, error = %err, "probe not permitted");
        }
        ErrorKind::ConnectionFailed | ErrorKind::Timeout => {
            error!(context, feature = feature.name, step, error = %err, "probe could not reach cluster");
        }
        _ => {
            error!(context, feature = feature.name, step, error = ?err, "probe failed");
        }
    }
}

/// Workload fields read during probing.
#[derive(Debug, Clone, Deserialize)]
struct Workload {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<WorkloadSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkloadSpec {
    #[serde(default)]
    template: Option<PodTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
struct PodTemplate {
    #[serde(default)]
    spec: Option<PodSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Debug, Clone, Deserialize)]
struct Container {
    #[serde(default)]
    image: Option<String>,
}

impl Workload {
    fn first_image(&self) -> Option<&str> {
        self.spec
            .as_ref()?
            .template
            .as_ref()?
            .spec
            .as_ref()?
            .containers
            .iter()
            .find_map(|c| c.image.as_deref())
    }

    fn version(&self, version_label: &str) -> Option<String> {
        if let Some(label) = self.metadata.labels.get(version_label)
            && !label.trim().is_empty()
        {
            return Some(label.trim().to_string());
        }
        self.first_image().and_then(version_from_image)
    }

    /// Oldest first; undated workloads last; then namespace, then name.
    fn pick_order(&self, other: &Self) -> Ordering {
        let a = &self.metadata;
        let b = &other.metadata;
        match (a.creation_timestamp, b.creation_timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.namespace.cmp(&b.namespace))
        .then_with(|| a.name.cmp(&b.name))
    }
}

fn select_workload(candidates: &[Value]) -> Option<Workload> {
    candidates
        .iter()
        .filter_map(|raw| match Workload::deserialize(raw) {
            Ok(w) => Some(w),
            Err(e) => {
                debug!(error = %e, "ignoring unparseable workload");
                None
            }
        })
        .min_by(Workload::pick_order)
}

/// Extract a `vX.Y.Z` version from a container image reference.
///
/// Looks at the text after the last `:` and takes the first dotted numeric
/// triple found there, prefixed with `v`.
///
/// ```rust
/// # use kube9_core::detection::version_from_image;
/// assert_eq!(version_from_image("quay.io/argoproj/argocd:v2.9.3").as_deref(), Some("v2.9.3"));
/// assert_eq!(version_from_image("argocd-server:2.9.3").as_deref(), Some("v2.9.3"));
/// assert_eq!(version_from_image("argocd-server:latest"), None);
/// ```
pub fn version_from_image(image: &str) -> Option<String> {
    let (_, tag) = image.rsplit_once(':')?;
    SEMVER_TRIPLE
        .find(tag)
        .map(|m| format!("v{}", m.as_str()))
}
