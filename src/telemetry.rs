//! Telemetry metric name constants.
//!
//! Centralised metric names for kube9-core. Consumers install their own
//! `metrics` recorder; without a recorder installed, all metric calls are
//! no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `kube9_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `cache`: which cache answered: "resource", "detection", "list", "operator"
//! - `feature`: detected add-on (e.g. "argocd")
//! - `method`: detection provenance: "privileged_source" or "direct_probe"
//! - `reason`: why a fallback was taken (an [`ErrorKind`](crate::error::ErrorKind) string)

/// Total cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "kube9_cache_hits_total";

/// Total cache misses: absent or stale entries.
///
/// Reads that bypass the cache never consult it and are not counted.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "kube9_cache_misses_total";

/// Total detections resolved against the cluster (cache hits excluded).
///
/// Labels: `feature`, `method`, `installed` ("true" | "false").
pub const DETECTIONS_TOTAL: &str = "kube9_detections_total";

/// Total times a stale cached value was served because the backend failed.
///
/// Labels: `cache`, `reason`.
pub const STALE_FALLBACKS_TOTAL: &str = "kube9_stale_fallbacks_total";

/// Total raw items skipped because they failed to parse.
///
/// Labels: `kind`.
pub const PARSE_SKIPPED_TOTAL: &str = "kube9_parse_skipped_total";

/// Total tracked operations by outcome.
///
/// Labels: `outcome` ("succeeded" | "failed" | "timeout" | "gone" | "error").
pub const OPERATIONS_TOTAL: &str = "kube9_operations_total";

/// Total mutations issued against managed resources.
///
/// Labels: `action` ("sync" | "refresh" | "hard_refresh"), `status` ("ok" | "error").
pub const MUTATIONS_TOTAL: &str = "kube9_mutations_total";
