//! [`ResourceClient`] over the `kube` crate's dynamic API.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::kube::api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams};
use ::kube::config::{KubeConfigOptions, Kubeconfig};
use ::kube::core::GroupVersionKind;
use ::kube::{Client, Config};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ResourceClient, ResourceKind};
use crate::{Kube9Error, Result};

/// Connection timeout applied to every per-context client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout applied to every per-context client.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Kubernetes API access, one `kube::Client` per kubeconfig context.
///
/// Clients are built lazily on first use of a context and reused after.
pub struct KubeResourceClient {
    kubeconfig: Option<PathBuf>,
    clients: Mutex<HashMap<String, Client>>,
}

impl KubeResourceClient {
    /// Use the default kubeconfig resolution (`KUBECONFIG`, then `~/.kube/config`).
    pub fn new() -> Self {
        Self {
            kubeconfig: None,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Read contexts from an explicit kubeconfig file.
    pub fn with_kubeconfig(path: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: Some(path.into()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn into_shared(self) -> Arc<dyn ResourceClient> {
        Arc::new(self)
    }

    async fn client(&self, context: &str) -> Result<Client> {
        if let Some(client) = self.cached_client(context) {
            return Ok(client);
        }

        let options = KubeConfigOptions {
            context: Some(context.to_owned()),
            ..Default::default()
        };
        let mut config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Kube9Error::Configuration(format!(
                        "failed to read kubeconfig {}: {e}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await
            }
            None => Config::from_kubeconfig(&options).await,
        }
        .map_err(|e| {
            Kube9Error::Configuration(format!("failed to load context '{context}': {e}"))
        })?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config)?;
        debug!(context, "created kube client");
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(context.to_owned(), client.clone());
        }
        Ok(client)
    }

    fn cached_client(&self, context: &str) -> Option<Client> {
        self.clients
            .lock()
            .ok()
            .and_then(|clients| clients.get(context).cloned())
    }

    fn api(client: Client, kind: &ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(kind.group, kind.version, kind.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, kind.plural);
        match namespace {
            Some(ns) if kind.namespaced => Api::namespaced_with(client, ns, &resource),
            _ => Api::all_with(client, &resource),
        }
    }
}

impl Default for KubeResourceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    fn name(&self) -> &str {
        "kube"
    }

    async fn get(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        let api = Self::api(self.client(context).await?, kind, namespace);
        let object = api.get(name).await?;
        Ok(serde_json::to_value(object)?)
    }

    async fn list(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let api = Self::api(self.client(context).await?, kind, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = api.list(&params).await?;
        list.items
            .into_iter()
            .map(|object| serde_json::to_value(object).map_err(Kube9Error::from))
            .collect()
    }

    async fn patch(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        let api = Self::api(self.client(context).await?, kind, namespace);
        let object = api
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(serde_json::to_value(object)?)
    }
}
