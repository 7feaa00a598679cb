//! The operator's status document.
//!
//! The in-cluster operator publishes a JSON document in a ConfigMap
//! (default `kube9-system/kube9-operator-status`, data key `status`):
//!
//! ```json
//! {
//!   "mode": "operated",
//!   "tier": "free",
//!   "version": "1.2.0",
//!   "health": "healthy",
//!   "lastUpdate": "2025-01-10T12:00:00Z",
//!   "registered": false,
//!   "argocd": { "detected": true, "namespace": "argocd", "version": "v2.9.3" }
//! }
//! ```
//!
//! Feature sections (such as `argocd`) are optional. A missing section means
//! the operator has no opinion about that feature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resources::{ResourceClient, ResourceKind};
use crate::{Kube9Error, Result};

/// Default namespace of the operator.
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "kube9-system";
/// Default name of the status ConfigMap.
pub const DEFAULT_STATUS_CONFIG_MAP: &str = "kube9-operator-status";
/// Default ConfigMap data key holding the JSON document.
pub const DEFAULT_STATUS_KEY: &str = "status";

/// Where the operator publishes its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLocation {
    pub namespace: String,
    pub config_map: String,
    pub data_key: String,
}

impl Default for StatusLocation {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            config_map: DEFAULT_STATUS_CONFIG_MAP.to_string(),
            data_key: DEFAULT_STATUS_KEY.to_string(),
        }
    }
}

/// Self-reported operator health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorHealth {
    Healthy,
    Degraded,
    Unhealthy,
    #[serde(other)]
    Unknown,
}

/// Parsed operator status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStatus {
    /// Operator-declared mode (`operated`, `enabled`, ...).
    pub mode: String,
    #[serde(default)]
    pub tier: Option<String>,
    pub version: String,
    pub health: OperatorHealth,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Feature sections and any fields this crate does not model.
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

/// One feature's section in the status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSection {
    pub detected: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl OperatorStatus {
    /// The section for `feature`, `Ok(None)` when the document has none.
    pub fn feature(&self, feature: &str) -> Result<Option<FeatureSection>> {
        match self.sections.get(feature) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => FeatureSection::deserialize(raw).map(Some).map_err(|e| {
                Kube9Error::InvalidResource {
                    kind: format!("operator status section '{feature}'"),
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Parse the JSON document stored in the ConfigMap.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Kube9Error::InvalidResource {
            kind: "operator status".into(),
            reason: e.to_string(),
        })
    }
}

/// Read the operator status document.
///
/// `Ok(None)` when the ConfigMap does not exist (operator not installed).
/// A ConfigMap without the data key, or with an unparseable document, is
/// an [`InvalidResource`](Kube9Error::InvalidResource) error.
pub async fn read_status(
    client: &dyn ResourceClient,
    context: &str,
    location: &StatusLocation,
) -> Result<Option<OperatorStatus>> {
    let config_map = match client
        .get(
            context,
            &ResourceKind::CONFIG_MAP,
            Some(&location.namespace),
            &location.config_map,
        )
        .await
    {
        Ok(cm) => cm,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };

    let document = config_map
        .get("data")
        .and_then(|data| data.get(&location.data_key))
        .and_then(Value::as_str)
        .ok_or_else(|| Kube9Error::InvalidResource {
            kind: "operator status".into(),
            reason: format!(
                "ConfigMap {}/{} has no '{}' key",
                location.namespace, location.config_map, location.data_key
            ),
        })?;

    OperatorStatus::parse(document).map(Some)
}
