//! Add-on detection with a privileged source and a direct fallback.
//!
//! "Is feature X installed in context C, and where?" is answered in two
//! tiers:
//!
//! 1. a privileged [`StatusSource`] (the in-cluster operator's status
//!    document), which may report detected, not detected, or nothing;
//! 2. a [`Prober`] that inspects the cluster directly, consulted only when
//!    the source is silent or failing.
//!
//! [`DetectionClient`] runs the protocol and caches verdicts per context.
//!
//! # Flow
//!
//! ```text
//! is_installed(ctx)
//!       │ fresh cache? ──────────────────────────────► cached verdict
//!       ▼
//! StatusSource ── detected / not detected ─────────► cache + return
//!       │ no opinion / error
//!       ▼
//! Prober ── ok ────────────────────────────────────► cache + return
//!       │ error
//!       ▼
//! stale cache ──► or negative (DirectProbe), cached
//! ```

pub mod client;
pub mod prober;
pub mod source;

pub use client::DetectionClient;
pub use prober::{DirectProber, version_from_image};
pub use source::OperatorStatusSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::resources::ResourceKind;

/// Which path produced a [`DetectionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Reported by the in-cluster operator.
    PrivilegedSource,
    /// Inferred by probing cluster objects.
    DirectProbe,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::PrivilegedSource => "privileged_source",
            DetectionMethod::DirectProbe => "direct_probe",
        }
    }
}

/// Detection verdict for one feature in one context.
///
/// `namespace` and `version` are only populated when `installed`. A cached
/// verdict keeps the `detection_method` of the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStatus {
    pub installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub detection_method: DetectionMethod,
    /// Wall-clock time of the check, for display.
    pub last_checked: DateTime<Utc>,
}

impl DetectionStatus {
    pub fn installed(
        method: DetectionMethod,
        namespace: Option<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            installed: true,
            namespace,
            version,
            detection_method: method,
            last_checked: Utc::now(),
        }
    }

    pub fn not_installed(method: DetectionMethod) -> Self {
        Self {
            installed: false,
            namespace: None,
            version: None,
            detection_method: method,
            last_checked: Utc::now(),
        }
    }
}

/// What the privileged source says about a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureReport {
    /// The source saw the feature.
    Detected {
        namespace: Option<String>,
        version: Option<String>,
    },
    /// The source looked and the feature is absent.
    NotDetected,
    /// The source has no section for the feature (or is itself absent).
    NoOpinion,
}

/// Static description of a detectable add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    /// Feature key, also the section name in the operator status document.
    pub name: &'static str,
    /// Name of the CustomResourceDefinition whose presence signals the feature.
    pub crd_name: &'static str,
    /// Kind of the representative workload.
    pub workload_kind: ResourceKind,
    /// Label selector locating the representative workload.
    pub workload_selector: &'static str,
    /// Label carrying the workload's version, if set.
    pub version_label: &'static str,
    /// Namespace assumed when the workload cannot tell us.
    pub default_namespace: &'static str,
}

impl FeatureSpec {
    pub const ARGOCD: FeatureSpec = FeatureSpec {
        name: "argocd",
        crd_name: "applications.argoproj.io",
        workload_kind: ResourceKind::DEPLOYMENT,
        workload_selector: "app.kubernetes.io/name=argocd-server",
        version_label: "app.kubernetes.io/version",
        default_namespace: "argocd",
    };
}

/// Privileged, operator-reported status of features.
///
/// Must distinguish "not detected" from "no opinion": only the latter lets
/// the caller fall back to probing.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    async fn feature_status(&self, context: &str, feature: &str) -> Result<FeatureReport>;
}

/// Direct, cluster-native detection of a feature.
///
/// A missing schema registration is a verdict (`installed: false`), not an
/// error. Every other failure is returned so the caller can pick a fallback.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Prober name for logging/debugging.
    fn name(&self) -> &str;

    async fn probe(&self, context: &str, feature: &FeatureSpec) -> Result<DetectionStatus>;
}
