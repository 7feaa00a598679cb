//! Typed ArgoCD `Application`.
//!
//! Raw objects are validated at the parse boundary: `metadata.name`,
//! `metadata.namespace` and `spec` are required, everything else defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operation::OperationState;
use crate::resources::ObjectMeta;
use crate::{Kube9Error, Result};

/// Sync status as reported by ArgoCD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Synced,
    OutOfSync,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Health status as reported by ArgoCD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Progressing,
    Degraded,
    Suspended,
    Missing,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Where an application's manifests come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL", default)]
    pub repo_url: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub target_revision: Option<String>,
}

/// Where an application is deployed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// A managed ArgoCD application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub namespace: String,
    pub project: String,
    pub source: Option<ApplicationSource>,
    pub destination: ApplicationDestination,
    pub sync_status: SyncStatus,
    pub health_status: HealthStatus,
    /// Revision of the last sync, when known.
    pub revision: Option<String>,
    pub operation_state: Option<OperationState>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawApplication {
    metadata: ObjectMeta,
    spec: Option<RawSpec>,
    #[serde(default)]
    status: RawStatus,
}

#[derive(Deserialize)]
struct RawSpec {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    source: Option<ApplicationSource>,
    #[serde(default)]
    sources: Vec<ApplicationSource>,
    #[serde(default)]
    destination: ApplicationDestination,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    #[serde(default)]
    sync: RawSync,
    #[serde(default)]
    health: RawHealth,
    #[serde(default)]
    operation_state: Option<OperationState>,
}

#[derive(Default, Deserialize)]
struct RawSync {
    #[serde(default)]
    status: SyncStatus,
    #[serde(default)]
    revision: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawHealth {
    #[serde(default)]
    status: HealthStatus,
}

impl Application {
    /// Parse one raw `Application` object.
    pub fn from_object(object: &Value) -> Result<Self> {
        let invalid = |reason: String| Kube9Error::InvalidResource {
            kind: "Application".into(),
            reason,
        };

        let raw = RawApplication::deserialize(object).map_err(|e| invalid(e.to_string()))?;
        let name = raw
            .metadata
            .name
            .ok_or_else(|| invalid("missing metadata.name".into()))?;
        let namespace = raw
            .metadata
            .namespace
            .ok_or_else(|| invalid(format!("{name}: missing metadata.namespace")))?;
        let spec = raw
            .spec
            .ok_or_else(|| invalid(format!("{namespace}/{name}: missing spec")))?;

        let source = spec.source.or_else(|| spec.sources.into_iter().next());

        Ok(Self {
            name,
            namespace,
            project: spec.project.unwrap_or_else(|| "default".to_string()),
            source,
            destination: spec.destination,
            sync_status: raw.status.sync.status,
            health_status: raw.status.health.status,
            revision: raw.status.sync.revision,
            operation_state: raw.status.operation_state,
            created_at: raw.metadata.creation_timestamp,
        })
    }

    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced
    }

    pub fn is_healthy(&self) -> bool {
        self.health_status == HealthStatus::Healthy
    }
}
