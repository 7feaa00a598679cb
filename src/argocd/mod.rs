//! ArgoCD integration.
//!
//! [`ApplicationService`] lists and mutates `applications.argoproj.io`
//! objects of a context. Its inventory lives in a short-TTL list cache and
//! is only consulted when the [`DetectionClient`](crate::detection::DetectionClient)
//! says ArgoCD is installed. Every successful mutation invalidates both the
//! detection verdict and the inventory of the affected context.

pub mod application;
pub mod service;

pub use application::{
    Application, ApplicationDestination, ApplicationSource, HealthStatus, SyncStatus,
};
pub use service::{ApplicationService, REFRESH_ANNOTATION, SyncOptions};
