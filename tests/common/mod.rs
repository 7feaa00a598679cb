//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use kube9_core::detection::{
    DetectionStatus, FeatureReport, FeatureSpec, Prober, StatusSource,
};
use kube9_core::resources::{ResourceClient, ResourceKind};
use kube9_core::{Kube9Error, Result};

// ============================================================================
// In-memory cluster
// ============================================================================

/// A scriptable [`ResourceClient`] backed by maps.
///
/// - `get` returns objects stored with [`put`](Self::put), else `NotFound`;
/// - `list` returns items stored with [`set_list`](Self::set_list), else `[]`;
/// - `patch` records the patch and returns the stored object;
/// - [`fail`](Self::fail) makes every call on a kind return an error.
#[derive(Default)]
pub struct FakeCluster {
    objects: Mutex<HashMap<String, Value>>,
    lists: Mutex<HashMap<String, Vec<Value>>>,
    failures: Mutex<HashMap<String, fn() -> Kube9Error>>,
    patches: Mutex<Vec<(String, Value)>>,
    calls: Mutex<HashMap<String, u32>>,
}

fn object_key(context: &str, kind: &ResourceKind, namespace: Option<&str>, name: &str) -> String {
    format!("{context}|{}|{}|{name}", kind.plural, namespace.unwrap_or(""))
}

fn kind_key(context: &str, kind: &ResourceKind) -> String {
    format!("{context}|{}", kind.plural)
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        object: Value,
    ) {
        let key = object_key(context, kind, namespace, name);
        self.objects.lock().unwrap().insert(key, object);
    }

    pub fn remove(&self, context: &str, kind: &ResourceKind, namespace: Option<&str>, name: &str) {
        let key = object_key(context, kind, namespace, name);
        self.objects.lock().unwrap().remove(&key);
    }

    pub fn set_list(&self, context: &str, kind: &ResourceKind, items: Vec<Value>) {
        self.lists
            .lock()
            .unwrap()
            .insert(kind_key(context, kind), items);
    }

    pub fn fail(&self, context: &str, kind: &ResourceKind, error: fn() -> Kube9Error) {
        self.failures
            .lock()
            .unwrap()
            .insert(kind_key(context, kind), error);
    }

    pub fn heal(&self, context: &str, kind: &ResourceKind) {
        self.failures
            .lock()
            .unwrap()
            .remove(&kind_key(context, kind));
    }

    /// Number of `op` ("get" | "list" | "patch") calls made for `kind`.
    pub fn calls(&self, op: &str, kind: &ResourceKind) -> u32 {
        let key = format!("{op}|{}", kind.plural);
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    pub fn patches(&self) -> Vec<(String, Value)> {
        self.patches.lock().unwrap().clone()
    }

    fn record(&self, op: &str, context: &str, kind: &ResourceKind) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(format!("{op}|{}", kind.plural))
            .or_insert(0) += 1;
        match self.failures.lock().unwrap().get(&kind_key(context, kind)) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceClient for FakeCluster {
    fn name(&self) -> &str {
        "fake"
    }

    async fn get(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        self.record("get", context, kind)?;
        self.objects
            .lock()
            .unwrap()
            .get(&object_key(context, kind, namespace, name))
            .cloned()
            .ok_or_else(|| Kube9Error::NotFound(kind.describe(namespace, name)))
    }

    async fn list(
        &self,
        context: &str,
        kind: &ResourceKind,
        _namespace: Option<&str>,
        _label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.record("list", context, kind)?;
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(&kind_key(context, kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn patch(
        &self,
        context: &str,
        kind: &ResourceKind,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        self.record("patch", context, kind)?;
        self.patches
            .lock()
            .unwrap()
            .push((name.to_string(), patch.clone()));
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(&object_key(context, kind, namespace, name))
            .ok_or_else(|| Kube9Error::NotFound(kind.describe(namespace, name)))?;
        merge_patch(object, patch);
        Ok(object.clone())
    }
}

/// JSON merge patch (RFC 7386), as the API server applies it.
fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

// ============================================================================
// Scripted detection collaborators
// ============================================================================

pub enum SourceBehavior {
    Report(FeatureReport),
    Fail(fn() -> Kube9Error),
}

/// A [`StatusSource`] whose answer can be changed between calls.
pub struct ScriptedSource {
    behavior: Mutex<SourceBehavior>,
    calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(behavior: SourceBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set(&self, behavior: SourceBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn feature_status(&self, _context: &str, _feature: &str) -> Result<FeatureReport> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &*self.behavior.lock().unwrap() {
            SourceBehavior::Report(report) => Ok(report.clone()),
            SourceBehavior::Fail(error) => Err(error()),
        }
    }
}

pub enum ProbeBehavior {
    Status(DetectionStatus),
    Fail(fn() -> Kube9Error),
}

/// A [`Prober`] whose answer can be changed between calls.
pub struct ScriptedProber {
    behavior: Mutex<ProbeBehavior>,
    calls: AtomicU32,
}

impl ScriptedProber {
    pub fn new(behavior: ProbeBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set(&self, behavior: ProbeBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn probe(&self, _context: &str, _feature: &FeatureSpec) -> Result<DetectionStatus> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match &*self.behavior.lock().unwrap() {
            ProbeBehavior::Status(status) => Ok(status.clone()),
            ProbeBehavior::Fail(error) => Err(error()),
        }
    }
}

pub fn connection_failed() -> Kube9Error {
    Kube9Error::ConnectionFailed("connection refused".into())
}

pub fn permission_denied() -> Kube9Error {
    Kube9Error::PermissionDenied("forbidden".into())
}

pub fn not_found() -> Kube9Error {
    Kube9Error::NotFound("gone".into())
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn argocd_application(namespace: &str, name: &str) -> Value {
    json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Application",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {
            "project": "default",
            "source": {"repoURL": "https://github.com/example/apps", "path": name, "targetRevision": "HEAD"},
            "destination": {"server": "https://kubernetes.default.svc", "namespace": name}
        },
        "status": {
            "sync": {"status": "Synced", "revision": "abc123"},
            "health": {"status": "Healthy"}
        }
    })
}

pub fn argocd_crd() -> Value {
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": "applications.argoproj.io"}
    })
}

pub fn argocd_server(namespace: &str, image: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "argocd-server",
            "namespace": namespace,
            "labels": {"app.kubernetes.io/name": "argocd-server"},
            "creationTimestamp": "2024-02-01T00:00:00Z"
        },
        "spec": {"template": {"spec": {"containers": [{"name": "argocd-server", "image": image}]}}}
    })
}

pub fn operator_config_map(document: &Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "kube9-operator-status", "namespace": "kube9-system"},
        "data": {"status": document.to_string()}
    })
}

pub fn operator_document(argocd: Option<Value>) -> Value {
    let mut document = json!({
        "mode": "operated",
        "tier": "free",
        "version": "1.0.0",
        "health": "healthy",
        "lastUpdate": chrono::Utc::now().to_rfc3339(),
        "registered": false
    });
    if let Some(section) = argocd {
        document["argocd"] = section;
    }
    document
}
