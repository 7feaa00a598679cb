//! kube9-core - cluster-state caching and add-on detection
//!
//! This crate answers the questions a Kubernetes cluster browser asks over
//! and over, without hammering the API server:
//!
//! - Is the kube9 operator running, and in which [`ClusterMode`]?
//! - Is ArgoCD installed in this context, where, and which version?
//! - Which ArgoCD applications exist, and what happened to the sync I
//!   just started?
//! - What nodes, pods, services and deployments are there?
//!
//! Answers are cached per context with a TTL per tier (detection
//! verdicts for minutes, inventories for seconds). Read operations never
//! fail: a broken backend yields the last known answer, else an empty or
//! negative one. Mutations and the single-object lookup return errors.
//!
//! All cluster access goes through a [`ResourceClient`](resources::ResourceClient).
//! Enable the `kube` feature for the kubeconfig-backed implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use kube9_core::Kube9;
//!
//! #[tokio::main]
//! async fn main() -> kube9_core::Result<()> {
//!     // With the `kube` feature the default client reads ~/.kube/config.
//!     let core = Kube9::builder().build()?;
//!
//!     let argocd = core.argocd_detection().is_installed("prod", false).await;
//!     if argocd.installed {
//!         for app in core.applications().get_applications("prod", false).await {
//!             println!("{} {:?} {:?}", app.name, app.sync_status, app.health_status);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod argocd;
mod builder;
pub mod cache;
pub mod config;
pub mod detection;
pub mod error;
pub mod operation;
pub mod operator;
pub mod resources;
pub mod telemetry;

// Re-export main types at crate root
pub use config::Config;
pub use builder::{Kube9, Kube9Builder, Kube9Core};
pub use error::{Kube9Error, Result};

pub use argocd::{Application, ApplicationService, HealthStatus, SyncOptions, SyncStatus};
pub use detection::{DetectionClient, DetectionMethod, DetectionStatus, FeatureReport};
pub use operation::{
    OperationPhase, OperationResult, OperationState, OperationTracker, TrackerConfig,
};
pub use operator::{ClusterMode, OperatorStatus, OperatorStatusClient};
