//! The slice of Kubernetes object metadata this crate reads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{Kube9Error, Result};

/// `metadata` of a Kubernetes object. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Extract `metadata` from a raw object.
    pub fn from_object(object: &Value) -> Result<Self> {
        let meta = object
            .get("metadata")
            .ok_or_else(|| Kube9Error::InvalidResource {
                kind: kind_of(object),
                reason: "missing metadata".into(),
            })?;
        Ok(ObjectMeta::deserialize(meta)?)
    }
}

/// The object's `kind`, or `"object"` when absent.
pub(crate) fn kind_of(object: &Value) -> String {
    object
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("object")
        .to_string()
}
