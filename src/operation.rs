//! Polling of asynchronous operations to completion.
//!
//! After a mutation (an ArgoCD sync, for instance) the controller reports
//! progress in an `operationState` block. [`OperationTracker::track`] polls
//! a caller-supplied reader until the phase is terminal, the target
//! disappears or the overall timeout elapses.
//!
//! ```text
//! Running / Terminating / (no state yet) ──sleep──► poll again
//! Succeeded ──────────────────────────────────────► Ok(success: true)
//! Failed / Error ─────────────────────────────────► Ok(success: false)
//! NotFound ───────────────────────────────────────► Err(ResourceGone)
//! transient read error ──warn──sleep──────────────► poll again
//! any other read error ───────────────────────────► Err(error)
//! timeout ────────────────────────────────────────► Err(OperationTimeout)
//! ```
//!
//! A mutation does not replace `operationState` until the controller picks
//! the new operation up, so the state read right after a sync may belong to
//! the previous one. [`OperationTracker::track_application_after`] treats
//! such a state as "not started yet".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::resources::{ResourceClient, ResourceKind};
use crate::telemetry;
use crate::{Kube9Error, Result};

/// Default interval between polls (2 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default ceiling on a tracked operation (5 minutes).
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Phase of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationPhase {
    Running,
    Terminating,
    Succeeded,
    Failed,
    Error,
}

impl OperationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationPhase::Succeeded | OperationPhase::Failed | OperationPhase::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationPhase::Running => "Running",
            OperationPhase::Terminating => "Terminating",
            OperationPhase::Succeeded => "Succeeded",
            OperationPhase::Failed => "Failed",
            OperationPhase::Error => "Error",
        }
    }
}

/// Controller-reported state of an operation. Read only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    pub phase: OperationPhase,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationState {
    pub fn new(phase: OperationPhase) -> Self {
        Self {
            phase,
            message: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Terminal outcome of a tracked operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub phase: OperationPhase,
    pub message: Option<String>,
}

impl From<OperationState> for OperationResult {
    fn from(state: OperationState) -> Self {
        Self {
            success: state.phase == OperationPhase::Succeeded,
            phase: state.phase,
            message: state.message,
        }
    }
}

/// Polling cadence and ceiling.
///
/// ```rust
/// # use kube9_core::operation::TrackerConfig;
/// # use std::time::Duration;
/// let config = TrackerConfig::new()
///     .poll_interval(Duration::from_secs(1))
///     .timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between polls. Default: 2 seconds.
    pub poll_interval: Duration,
    /// Overall ceiling. Default: 5 minutes.
    pub timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Polls operation state until it settles.
#[derive(Clone)]
pub struct OperationTracker {
    client: Arc<dyn ResourceClient>,
    config: TrackerConfig,
}

impl OperationTracker {
    pub fn new(client: Arc<dyn ResourceClient>, config: TrackerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Poll `read` until the operation on `target` reaches a terminal phase.
    ///
    /// The first poll happens immediately. `Ok(None)` from `read` means the
    /// operation has not been picked up yet and is polled again. A
    /// [`NotFound`](Kube9Error::NotFound) from `read` aborts with
    /// [`ResourceGone`](Kube9Error::ResourceGone). Transient errors (see
    /// [`Kube9Error::is_transient`]) are logged and retried; any other error,
    /// `PermissionDenied` included, is returned at once.
    pub async fn track<F, Fut>(&self, target: &str, read: F) -> Result<OperationResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<OperationState>>>,
    {
        let timeout = self.config.timeout;
        let outcome = tokio::time::timeout(timeout, self.poll_until_settled(target, read)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(Kube9Error::OperationTimeout {
                target: target.to_string(),
                after: timeout,
            }),
        };

        let label = match &result {
            Ok(r) if r.success => "succeeded",
            Ok(_) => "failed",
            Err(Kube9Error::OperationTimeout { .. }) => "timeout",
            Err(Kube9Error::ResourceGone(_)) => "gone",
            Err(_) => "error",
        };
        metrics::counter!(telemetry::OPERATIONS_TOTAL, "outcome" => label).increment(1);

        match &result {
            Ok(r) => info!(resource = target, phase = r.phase.as_str(), success = r.success, "operation settled"),
            Err(e) => warn!(resource = target, error = %e, "operation tracking stopped"),
        }
        result
    }

    async fn poll_until_settled<F, Fut>(&self, target: &str, mut read: F) -> Result<OperationResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<OperationState>>>,
    {
        let mut polls: u32 = 0;
        loop {
            polls += 1;
            match read().await {
                Ok(Some(state)) if state.phase.is_terminal() => {
                    debug!(resource = target, polls, "terminal phase reached");
                    return Ok(state.into());
                }
                Ok(Some(state)) => {
                    debug!(resource = target, polls, phase = state.phase.as_str(), "operation in progress");
                }
                Ok(None) => {
                    debug!(resource = target, polls, "no operation state yet");
                }
                Err(e) if e.is_not_found() => {
                    return Err(Kube9Error::ResourceGone(target.to_string()));
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(resource = target, polls, error = %e, "reading operation state failed, retrying");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Track the current operation of an ArgoCD Application.
    pub async fn track_application(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
    ) -> Result<OperationResult> {
        self.track_application_after(context, namespace, name, None)
            .await
    }

    /// Track the operation started by a mutation of an ArgoCD Application.
    ///
    /// `previous_start` is the `startedAt` of the operation state the
    /// application carried before the mutation. A state with that start
    /// time, or a terminal state while a requested `operation` is still
    /// pending, is the previous operation and is polled past.
    #[instrument(skip(self))]
    pub async fn track_application_after(
        &self,
        context: &str,
        namespace: &str,
        name: &str,
        previous_start: Option<DateTime<Utc>>,
    ) -> Result<OperationResult> {
        let target = ResourceKind::ARGO_APPLICATION.describe(Some(namespace), name);
        let client = &self.client;
        self.track(&target, || async move {
            let app = client
                .get(context, &ResourceKind::ARGO_APPLICATION, Some(namespace), name)
                .await?;
            current_operation_state(&app, previous_start)
        })
        .await
    }
}

/// The operation state of `object` if it belongs to the latest operation.
///
/// `None` while the requested operation has not replaced the previous
/// state yet.
fn current_operation_state(
    object: &Value,
    previous_start: Option<DateTime<Utc>>,
) -> Result<Option<OperationState>> {
    let Some(state) = operation_state_of(object)? else {
        return Ok(None);
    };
    let pending_request = object.get("operation").is_some_and(|op| !op.is_null());
    let from_previous = previous_start.is_some() && state.started_at == previous_start;
    if from_previous || (pending_request && state.phase.is_terminal()) {
        return Ok(None);
    }
    Ok(Some(state))
}

/// `status.operationState` of a raw object, `None` when absent.
pub fn operation_state_of(object: &Value) -> Result<Option<OperationState>> {
    match object.pointer("/status/operationState") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => OperationState::deserialize(raw).map(Some).map_err(|e| {
            Kube9Error::InvalidResource {
                kind: "operationState".into(),
                reason: e.to_string(),
            }
        }),
    }
}
