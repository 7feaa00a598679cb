//! Cluster access collaborator.
//!
//! Everything this crate knows about a cluster it learns through a
//! [`ResourceClient`]: typed `get` / `list` / `patch` calls per
//! [`ResourceKind`], returning raw JSON objects and failing with the
//! [`Kube9Error`](crate::Kube9Error) taxonomy. The crate never spawns
//! processes or speaks HTTP itself.
//!
//! Implementations:
//! - [`KubeResourceClient`] (feature `kube`): per-context clients built
//!   from kubeconfig, using `kube`'s dynamic API.
//! - test doubles in `tests/`.
//!
//! [`ResourceLister`] layers the TTL [`ResourceCache`](crate::cache::ResourceCache)
//! over the high-frequency listings (nodes, pods, services, deployments).

#[cfg(feature = "kube")]
pub mod kube;
pub mod lister;
pub mod meta;

#[cfg(feature = "kube")]
pub use self::kube::KubeResourceClient;
pub use lister::{ListingTtls, ResourceLister};
pub use meta::ObjectMeta;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Group/version/kind plus the routing facts the API needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// API group (`""` for the core group).
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    /// Lower-case plural used in API paths and cache keys.
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceKind {
    pub const CONFIG_MAP: ResourceKind = ResourceKind {
        group: "",
        version: "v1",
        kind: "ConfigMap",
        plural: "configmaps",
        namespaced: true,
    };

    pub const NODE: ResourceKind = ResourceKind {
        group: "",
        version: "v1",
        kind: "Node",
        plural: "nodes",
        namespaced: false,
    };

    pub const POD: ResourceKind = ResourceKind {
        group: "",
        version: "v1",
        kind: "Pod",
        plural: "pods",
        namespaced: true,
    };

    pub const SERVICE: ResourceKind = ResourceKind {
        group: "",
        version: "v1",
        kind: "Service",
        plural: "services",
        namespaced: true,
    };

    pub const DEPLOYMENT: ResourceKind = ResourceKind {
        group: "apps",
        version: "v1",
        kind: "Deployment",
        plural: "deployments",
        namespaced: true,
    };

    pub const CUSTOM_RESOURCE_DEFINITION: ResourceKind = ResourceKind {
        group: "apiextensions.k8s.io",
        version: "v1",
        kind: "CustomResourceDefinition",
        plural: "customresourcedefinitions",
        namespaced: false,
    };

    pub const ARGO_APPLICATION: ResourceKind = ResourceKind {
        group: "argoproj.io",
        version: "v1alpha1",
        kind: "Application",
        plural: "applications",
        namespaced: true,
    };

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Human-readable object reference for logs and errors.
    pub fn describe(&self, namespace: Option<&str>, name: &str) -> String {
        match namespace {
            Some(ns) if self.namespaced => format!("{} {ns}/{name}", self.kind),
            _ => format!("{} {name}", self.kind),
        }
    }
}

/// Typed access to cluster objects, per context.
///
/// `namespace = None` on a namespaced kind means "all namespaces" for
/// `list`. Cluster-scoped kinds ignore `namespace`.
///
/// Implementations must report failures with the collaborator taxonomy
/// (`NotFound`, `PermissionDenied`, `ConnectionFailed`, `Timeout`,
/// `Unknown`); callers choose their fallback from the variant.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Client name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch a single object.
    async fn get(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value>;

    /// List objects, optionally filtered by a label selector.
    async fn list(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// Apply a JSON merge patch and return the updated object.
    async fn patch(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value>;
}
