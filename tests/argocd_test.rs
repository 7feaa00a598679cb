//! Tests for the ArgoCD application service: inventory caching, partial
//! parsing and mutation-driven invalidation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use common::{
    FakeCluster, ProbeBehavior, ScriptedProber, ScriptedSource, SourceBehavior,
    argocd_application, connection_failed,
};
use kube9_core::argocd::{ApplicationService, HealthStatus, SyncOptions, SyncStatus};
use kube9_core::cache::{CacheConfig, ContextCache};
use kube9_core::detection::{DetectionClient, FeatureReport, FeatureSpec};
use kube9_core::operation::{OperationTracker, TrackerConfig};
use kube9_core::resources::ResourceKind;
use kube9_core::telemetry;
use kube9_core::Kube9Error;

struct Harness {
    cluster: Arc<FakeCluster>,
    source: Arc<ScriptedSource>,
    detection: Arc<DetectionClient>,
    service: ApplicationService,
}

fn harness(report: FeatureReport) -> Harness {
    let cluster = Arc::new(FakeCluster::new());
    let source = Arc::new(ScriptedSource::new(SourceBehavior::Report(report)));
    let prober = Arc::new(ScriptedProber::new(ProbeBehavior::Fail(connection_failed)));
    let detection = Arc::new(DetectionClient::new(
        FeatureSpec::ARGOCD,
        source.clone(),
        prober,
        Arc::new(ContextCache::new(
            "detection",
            &CacheConfig::new().ttl(Duration::from_secs(300)),
        )),
    ));
    let service = ApplicationService::new(
        cluster.clone(),
        detection.clone(),
        Arc::new(ContextCache::new(
            "list",
            &CacheConfig::new().ttl(Duration::from_secs(30)),
        )),
        OperationTracker::new(
            cluster.clone(),
            TrackerConfig::new()
                .poll_interval(Duration::from_secs(1))
                .timeout(Duration::from_secs(10)),
        ),
    );
    Harness {
        cluster,
        source,
        detection,
        service,
    }
}

fn installed() -> FeatureReport {
    FeatureReport::Detected {
        namespace: Some("argocd".into()),
        version: Some("v2.9.3".into()),
    }
}

fn list_calls(h: &Harness) -> u32 {
    h.cluster.calls("list", &ResourceKind::ARGO_APPLICATION)
}

// ============================================================================
// Inventory
// ============================================================================

#[tokio::test]
async fn lists_and_caches_applications() {
    let h = harness(installed());
    h.cluster.set_list(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        vec![argocd_application("argocd", "web"), argocd_application("argocd", "api")],
    );

    let apps = h.service.get_applications("prod", false).await;
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].sync_status, SyncStatus::Synced);
    assert_eq!(apps[0].health_status, HealthStatus::Healthy);

    h.service.get_applications("prod", false).await;
    assert_eq!(list_calls(&h), 1, "second call served from cache");

    h.service.get_applications("prod", true).await;
    assert_eq!(list_calls(&h), 2, "bypass forces a fetch");
}

#[tokio::test]
async fn absence_short_circuit_does_not_populate_cache() {
    let h = harness(FeatureReport::NotDetected);
    h.cluster.set_list(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        vec![argocd_application("argocd", "web")],
    );

    assert!(h.service.get_applications("prod", false).await.is_empty());
    assert_eq!(list_calls(&h), 0);
    assert!(h.service.cached("prod").is_none());

    // ArgoCD appears: the next call must fetch live, not serve a cached [].
    h.source.set(SourceBehavior::Report(installed()));
    h.detection.invalidate("prod");

    let apps = h.service.get_applications("prod", false).await;
    assert_eq!(apps.len(), 1);
    assert_eq!(list_calls(&h), 1);
}

#[tokio::test]
async fn installed_with_zero_items_is_cached() {
    let h = harness(installed());

    assert!(h.service.get_applications("prod", false).await.is_empty());
    assert!(h.service.get_applications("prod", false).await.is_empty());

    assert_eq!(list_calls(&h), 1);
    assert_eq!(h.service.cached("prod"), Some(vec![]));
}

#[tokio::test(start_paused = true)]
async fn fetch_error_serves_stale_inventory() {
    let h = harness(installed());
    h.cluster.set_list(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        vec![argocd_application("argocd", "web")],
    );
    let first = h.service.get_applications("prod", false).await;

    tokio::time::advance(Duration::from_secs(31)).await;
    h.cluster
        .fail("prod", &ResourceKind::ARGO_APPLICATION, connection_failed);

    let second = h.service.get_applications("prod", false).await;
    assert_eq!(second, first);
    assert_eq!(list_calls(&h), 2);
}

#[tokio::test]
async fn fetch_error_without_history_is_empty() {
    let h = harness(installed());
    h.cluster
        .fail("prod", &ResourceKind::ARGO_APPLICATION, connection_failed);

    assert!(h.service.get_applications("prod", false).await.is_empty());
}

// ============================================================================
// Partial parse
// ============================================================================

fn counter_total(snapshot: &[(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)], name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn malformed_item_is_skipped_once() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let apps = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let h = harness(installed());
                h.cluster.set_list(
                    "prod",
                    &ResourceKind::ARGO_APPLICATION,
                    vec![
                        argocd_application("argocd", "web"),
                        json!({"kind": "Application", "metadata": {"name": "broken"}}),
                        argocd_application("argocd", "api"),
                    ],
                );
                h.service.get_applications("prod", false).await
            })
        })
    });

    let names: Vec<_> = apps.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["web", "api"]);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::PARSE_SKIPPED_TOTAL), 1);
}

// ============================================================================
// Single lookup
// ============================================================================

#[tokio::test]
async fn get_application_returns_not_found() {
    let h = harness(installed());

    let err = h
        .service
        .get_application("prod", "argocd", "missing")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn get_application_parses_object() {
    let h = harness(installed());
    h.cluster.put(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        Some("argocd"),
        "web",
        argocd_application("argocd", "web"),
    );

    let app = h.service.get_application("prod", "argocd", "web").await.unwrap();

    assert_eq!(app.namespace, "argocd");
    assert_eq!(app.project, "default");
}

// ============================================================================
// Mutations
// ============================================================================

fn put_web(h: &Harness) {
    h.cluster.put(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        Some("argocd"),
        "web",
        argocd_application("argocd", "web"),
    );
}

#[tokio::test]
async fn sync_invalidates_both_caches() {
    let h = harness(installed());
    put_web(&h);
    h.service.get_applications("prod", false).await;
    assert!(h.detection.cached("prod").is_some());
    assert!(h.service.cached("prod").is_some());

    h.service
        .sync("prod", "argocd", "web", &SyncOptions::new().prune(true))
        .await
        .unwrap();

    assert!(h.detection.cached("prod").is_none());
    assert!(h.service.cached("prod").is_none());

    let patches = h.cluster.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].1["operation"]["sync"]["prune"], true);
}

#[tokio::test]
async fn hard_refresh_sets_annotation_and_invalidates() {
    let h = harness(installed());
    put_web(&h);
    h.service.get_applications("prod", false).await;

    h.service.hard_refresh("prod", "argocd", "web").await.unwrap();

    assert!(h.service.cached("prod").is_none());
    let patches = h.cluster.patches();
    assert_eq!(
        patches[0].1["metadata"]["annotations"]["argocd.argoproj.io/refresh"],
        "hard"
    );
}

#[tokio::test]
async fn failed_mutation_keeps_caches() {
    let h = harness(installed());
    h.service.get_applications("prod", false).await;

    let err = h.service.refresh("prod", "argocd", "missing").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(h.detection.cached("prod").is_some());
    assert!(h.service.cached("prod").is_some());
}

fn web_with_operation(state: serde_json::Value) -> serde_json::Value {
    let mut app = argocd_application("argocd", "web");
    app["status"]["operationState"] = state;
    app
}

/// Stores `app` as the controller would after `delay`.
fn controller_writes(h: &Harness, delay: Duration, app: serde_json::Value) {
    let cluster = h.cluster.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        cluster.put(
            "prod",
            &ResourceKind::ARGO_APPLICATION,
            Some("argocd"),
            "web",
            app,
        );
    });
}

#[tokio::test(start_paused = true)]
async fn sync_and_track_reports_outcome() {
    let h = harness(installed());
    put_web(&h);
    controller_writes(
        &h,
        Duration::from_secs(3),
        web_with_operation(json!({
            "phase": "Succeeded",
            "message": "successfully synced (all tasks run)",
            "startedAt": "2025-01-10T12:00:00Z"
        })),
    );

    let result = h
        .service
        .sync_and_track("prod", "argocd", "web", &SyncOptions::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("successfully synced (all tasks run)")
    );
    assert!(h.service.cached("prod").is_none());
}

#[tokio::test(start_paused = true)]
async fn sync_and_track_skips_previous_operation_state() {
    let h = harness(installed());
    h.cluster.put(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        Some("argocd"),
        "web",
        web_with_operation(json!({
            "phase": "Succeeded",
            "message": "old sync",
            "startedAt": "2020-01-01T00:00:00Z"
        })),
    );
    let started = tokio::time::Instant::now();
    controller_writes(
        &h,
        Duration::from_secs(2),
        web_with_operation(json!({
            "phase": "Running",
            "message": "waiting for healthy state",
            "startedAt": "2025-01-10T12:00:00Z"
        })),
    );
    controller_writes(
        &h,
        Duration::from_secs(4),
        web_with_operation(json!({
            "phase": "Failed",
            "message": "one or more objects failed to apply",
            "startedAt": "2025-01-10T12:00:00Z"
        })),
    );

    let result = h
        .service
        .sync_and_track("prod", "argocd", "web", &SyncOptions::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("one or more objects failed to apply")
    );
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn sync_never_picked_up_times_out() {
    let h = harness(installed());
    h.cluster.put(
        "prod",
        &ResourceKind::ARGO_APPLICATION,
        Some("argocd"),
        "web",
        web_with_operation(json!({
            "phase": "Succeeded",
            "message": "old sync",
            "startedAt": "2020-01-01T00:00:00Z"
        })),
    );

    let err = h
        .service
        .sync_and_track("prod", "argocd", "web", &SyncOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Kube9Error::OperationTimeout { .. }));
}
