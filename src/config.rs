//! Configuration loading.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. explicit path (`--config <path>`)
//! 2. `~/.kube9/config.toml` (user)
//! 3. `/etc/kube9/config.toml` (system)
//! 4. built-in defaults
//!
//! Every field is optional:
//!
//! ```toml
//! kubeconfig = "/home/me/.kube/config"
//!
//! [detection]
//! cache_ttl_secs = 300
//!
//! [lists]
//! cache_ttl_secs = 30
//!
//! [resources]
//! ttl_secs = 30
//! node_ttl_secs = 60
//! max_entries = 10000
//!
//! [operations]
//! poll_interval_secs = 2
//! timeout_secs = 300
//!
//! [operator]
//! namespace = "kube9-system"
//! config_map = "kube9-operator-status"
//! data_key = "status"
//! staleness_secs = 300
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, DEFAULT_DETECTION_TTL, DEFAULT_LIST_TTL};
use crate::operation::{DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL, TrackerConfig};
use crate::operator::{
    DEFAULT_STALENESS, StatusLocation,
    status::{DEFAULT_OPERATOR_NAMESPACE, DEFAULT_STATUS_CONFIG_MAP, DEFAULT_STATUS_KEY},
};
use crate::resources::ListingTtls;
use crate::{Kube9Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Kubeconfig file. Default: `KUBECONFIG` / `~/.kube/config`.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub lists: ListsConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub operations: OperationsConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
}

/// `[detection]`: detection verdict cache.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Verdict TTL in seconds (default: 300).
    #[serde(default = "default_detection_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub max_entries: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_detection_ttl(),
            max_entries: None,
        }
    }
}

fn default_detection_ttl() -> u64 {
    DEFAULT_DETECTION_TTL.as_secs()
}

impl DetectionConfig {
    pub fn cache_config(&self) -> CacheConfig {
        cache_config(self.cache_ttl_secs, self.max_entries)
    }
}

/// `[lists]`: inventory cache.
#[derive(Debug, Clone, Deserialize)]
pub struct ListsConfig {
    /// Inventory TTL in seconds (default: 30).
    #[serde(default = "default_list_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub max_entries: Option<u64>,
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_list_ttl(),
            max_entries: None,
        }
    }
}

fn default_list_ttl() -> u64 {
    DEFAULT_LIST_TTL.as_secs()
}

impl ListsConfig {
    pub fn cache_config(&self) -> CacheConfig {
        cache_config(self.cache_ttl_secs, self.max_entries)
    }
}

fn cache_config(ttl_secs: u64, max_entries: Option<u64>) -> CacheConfig {
    let config = CacheConfig::new().ttl(Duration::from_secs(ttl_secs));
    match max_entries {
        Some(n) => config.max_entries(n),
        None => config,
    }
}

/// `[resources]`: cached cluster listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    /// TTL for listings (default: 30).
    #[serde(default = "default_resource_ttl")]
    pub ttl_secs: u64,
    /// TTL for node listings (default: 60).
    #[serde(default = "default_node_ttl")]
    pub node_ttl_secs: u64,
    #[serde(default)]
    pub max_entries: Option<u64>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_resource_ttl(),
            node_ttl_secs: default_node_ttl(),
            max_entries: None,
        }
    }
}

fn default_resource_ttl() -> u64 {
    30
}

fn default_node_ttl() -> u64 {
    60
}

impl ResourcesConfig {
    pub fn cache_config(&self) -> CacheConfig {
        cache_config(self.ttl_secs, self.max_entries)
    }

    pub fn listing_ttls(&self) -> ListingTtls {
        ListingTtls {
            nodes: Duration::from_secs(self.node_ttl_secs),
            default: Duration::from_secs(self.ttl_secs),
        }
    }
}

/// `[operations]`: operation tracking.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_operation_timeout")]
    pub timeout_secs: u64,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_operation_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_operation_timeout() -> u64 {
    DEFAULT_OPERATION_TIMEOUT.as_secs()
}

impl OperationsConfig {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new()
            .poll_interval(Duration::from_secs(self.poll_interval_secs))
            .timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// `[operator]`: where the operator publishes its status.
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    #[serde(default = "default_operator_namespace")]
    pub namespace: String,
    #[serde(default = "default_config_map")]
    pub config_map: String,
    #[serde(default = "default_data_key")]
    pub data_key: String,
    /// Age after which a status document is considered stale (default: 300).
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: default_operator_namespace(),
            config_map: default_config_map(),
            data_key: default_data_key(),
            staleness_secs: default_staleness(),
        }
    }
}

fn default_operator_namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_string()
}

fn default_config_map() -> String {
    DEFAULT_STATUS_CONFIG_MAP.to_string()
}

fn default_data_key() -> String {
    DEFAULT_STATUS_KEY.to_string()
}

fn default_staleness() -> u64 {
    DEFAULT_STALENESS.as_secs()
}

impl OperatorConfig {
    pub fn location(&self) -> StatusLocation {
        StatusLocation {
            namespace: self.namespace.clone(),
            config_map: self.config_map.clone(),
            data_key: self.data_key.clone(),
        }
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first existing file of
    /// `~/.kube9/config.toml` and `/etc/kube9/config.toml` is used, else the
    /// defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Kube9Error::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            Kube9Error::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(Kube9Error::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".kube9").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/kube9/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.detection.cache_ttl_secs, 300);
        assert_eq!(config.lists.cache_ttl_secs, 30);
        assert_eq!(config.resources.ttl_secs, 30);
        assert_eq!(config.resources.node_ttl_secs, 60);
        assert_eq!(config.operations.poll_interval_secs, 2);
        assert_eq!(config.operations.timeout_secs, 300);
        assert_eq!(config.operator.namespace, "kube9-system");
        assert!(config.resources.max_entries.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
            [lists]
            cache_ttl_secs = 10

            [resources]
            max_entries = 500
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.lists.cache_ttl_secs, 10);
        // Defaults preserved
        assert_eq!(config.detection.cache_ttl_secs, 300);
        assert_eq!(config.resources.node_ttl_secs, 60);
        assert_eq!(config.resources.cache_config().max_entries, Some(500));
    }

    #[test]
    fn parse_operator_section() {
        let toml = r#"
            [operator]
            namespace = "platform"
            staleness_secs = 120
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let location = config.operator.location();
        assert_eq!(location.namespace, "platform");
        assert_eq!(location.config_map, "kube9-operator-status");
        assert_eq!(config.operator.staleness(), Duration::from_secs(120));
    }

    #[test]
    fn tracker_config_from_operations() {
        let toml = r#"
            [operations]
            poll_interval_secs = 1
            timeout_secs = 3
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let tracker = config.operations.tracker_config();
        assert_eq!(tracker.poll_interval, Duration::from_secs(1));
        assert_eq!(tracker.timeout, Duration::from_secs(3));
    }

    #[test]
    fn load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[detection]\ncache_ttl_secs = 60").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.detection.cache_config().ttl, Duration::from_secs(60));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn malformed_file_is_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[detection\ncache_ttl_secs = ").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, Kube9Error::Configuration(_)));
    }
}
