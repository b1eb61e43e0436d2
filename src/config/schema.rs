//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::cache::CacheScope;
use crate::routing::mode::RoutingMode;

/// Root configuration for the replication router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Unconditional last-resort backend; also the primary when
    /// `primaries` is empty.
    pub default_backend: String,

    /// Primaries of the default database, in selection order.
    pub primaries: Vec<String>,

    /// Replicas of the default database.
    pub replicas: Vec<String>,

    /// Reject writes issued while the unit of work is in replica mode.
    pub check_state_on_write: bool,

    /// When no replica is alive, try the primaries before the default backend.
    pub read_fallback_to_primaries: bool,

    /// Additional logical databases with their own primaries and replicas.
    pub databases: Vec<DatabaseConfig>,

    /// Per-backend settings, keyed by backend id.
    pub backends: BTreeMap<String, BackendEntry>,

    /// Operation name or pattern → forced routing mode.
    pub overrides: BTreeMap<String, RoutingMode>,

    /// Health check settings.
    pub health: HealthConfig,

    /// Background failover monitor settings.
    pub monitor: MonitorConfig,

    /// Read-after-write marker settings.
    pub sticky: StickyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_backend: "default".to_string(),
            primaries: Vec::new(),
            replicas: Vec::new(),
            check_state_on_write: true,
            read_fallback_to_primaries: false,
            databases: Vec::new(),
            backends: BTreeMap::new(),
            overrides: BTreeMap::new(),
            health: HealthConfig::default(),
            monitor: MonitorConfig::default(),
            sticky: StickyConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Liveness negative-cache TTL for `backend`.
    pub fn downtime_for(&self, backend: &str) -> Duration {
        let secs = self
            .backends
            .get(backend)
            .and_then(|b| b.downtime_secs)
            .unwrap_or(self.health.downtime_secs);
        Duration::from_secs(secs)
    }

    /// Negative-cache TTL used by the read-only service check.
    pub fn read_only_downtime_for(&self, backend: &str) -> Duration {
        let secs = self
            .backends
            .get(backend)
            .and_then(|b| b.read_only_downtime_secs)
            .unwrap_or(self.health.read_only_downtime_secs);
        Duration::from_secs(secs)
    }
}

/// A logical database other than the default one.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database name; also its primary when `primaries` is empty.
    pub name: String,

    #[serde(default)]
    pub primaries: Vec<String>,

    #[serde(default)]
    pub replicas: Vec<String>,
}

/// Per-backend settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendEntry {
    /// `host:port` probed by the built-in TCP probe.
    pub address: Option<String>,

    /// Overrides `health.downtime_secs` for this backend.
    pub downtime_secs: Option<u64>,

    /// Overrides `health.read_only_downtime_secs` for this backend.
    pub read_only_downtime_secs: Option<u64>,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Where failure records live.
    pub cache_scope: CacheScope,

    /// Seconds a backend that failed liveness is assumed dead.
    pub downtime_secs: u64,

    /// Seconds the read-only service check trusts a failure.
    pub read_only_downtime_secs: u64,

    /// Liveness probe attempts per check.
    pub attempts: u32,

    /// Probe attempts for the read-only service check.
    pub read_only_attempts: u32,

    /// Read-only service check also probes writability.
    pub select_read_only: bool,

    /// Connect timeout of the built-in TCP probe.
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_scope: CacheScope::Process,
            downtime_secs: 60,
            read_only_downtime_secs: 20,
            attempts: 1,
            read_only_attempts: 1,
            select_read_only: false,
            probe_timeout_ms: 1500,
        }
    }
}

/// Background failover monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Run the monitor; selection then stops probing.
    pub enabled: bool,

    /// Milliseconds between sweeps.
    pub interval_ms: u64,

    /// Include primaries in the sweep.
    pub check_primary: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 5000,
            check_primary: false,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Read-after-write marker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StickyConfig {
    /// Cookie carrying the "just wrote" marker.
    pub cookie_name: String,

    /// Marker lifetime in seconds.
    pub max_age_secs: u64,

    /// Response statuses that count as a successful write redirect.
    pub status_codes: Vec<u16>,

    /// Request header that forces a routing mode.
    pub force_state_header: String,
}

impl Default for StickyConfig {
    fn default() -> Self {
        Self {
            cookie_name: "just_updated".to_string(),
            max_age_secs: 5,
            status_codes: vec![302, 303],
            force_state_header: "x-replicated-state".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RouterConfig = toml::from_str("replicas = [\"slave1\"]").unwrap();
        assert_eq!(config.default_backend, "default");
        assert!(config.check_state_on_write);
        assert_eq!(config.health.downtime_secs, 60);
        assert_eq!(config.sticky.status_codes, vec![302, 303]);
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            default_backend = "main"
            primaries = ["main", "main_standby"]
            replicas = ["r1", "r2"]
            read_fallback_to_primaries = true

            [health]
            cache_scope = "unit"
            downtime_secs = 30
            attempts = 2

            [monitor]
            enabled = true
            interval_ms = 250
            check_primary = true

            [[databases]]
            name = "analytics"
            replicas = ["analytics_r1"]

            [backends.r1]
            address = "10.0.0.11:5432"
            downtime_secs = 5

            [overrides]
            "/admin/*" = "master"
            "reports.export" = "replica"
        "#;
        let config: RouterConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.primaries, vec!["main", "main_standby"]);
        assert_eq!(config.health.cache_scope, CacheScope::Unit);
        assert_eq!(config.monitor.interval(), Duration::from_millis(250));
        assert_eq!(config.databases[0].name, "analytics");
        assert_eq!(config.overrides["/admin/*"], RoutingMode::Primary);
        assert_eq!(config.downtime_for("r1"), Duration::from_secs(5));
        assert_eq!(config.downtime_for("r2"), Duration::from_secs(30));
        assert_eq!(config.read_only_downtime_for("r1"), Duration::from_secs(20));
    }
}
