//! The operator status document as a privileged [`StatusSource`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{FeatureReport, StatusSource};
use crate::Result;
use crate::operator::{StatusLocation, read_status};
use crate::resources::ResourceClient;

/// Answers feature questions from the operator's status ConfigMap.
///
/// No ConfigMap (operator not installed) and no section for the feature
/// both mean [`FeatureReport::NoOpinion`].
pub struct OperatorStatusSource {
    client: Arc<dyn ResourceClient>,
    location: StatusLocation,
}

impl OperatorStatusSource {
    pub fn new(client: Arc<dyn ResourceClient>, location: StatusLocation) -> Self {
        Self { client, location }
    }
}

#[async_trait]
impl StatusSource for OperatorStatusSource {
    fn name(&self) -> &str {
        "operator"
    }

    async fn feature_status(&self, context: &str, feature: &str) -> Result<FeatureReport> {
        let Some(status) = read_status(self.client.as_ref(), context, &self.location).await?
        else {
            debug!(context, feature, "no operator status document");
            return Ok(FeatureReport::NoOpinion);
        };

        Ok(match status.feature(feature)? {
            None => FeatureReport::NoOpinion,
            Some(section) if section.detected => FeatureReport::Detected {
                namespace: section.namespace,
                version: section.version,
            },
            Some(_) => FeatureReport::NotDetected,
        })
    }
}
