//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (probes, cache hits, active backends, fallbacks)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `replica_router_probe_total` (counter): probes by check kind and result
//! - `replica_router_health_cache_hits_total` (counter): probes skipped by the negative cache
//! - `replica_router_backend_active` (gauge): 1=active, 0=deactivated, by backend and role
//! - `replica_router_fallback_total` (counter): selections that fell back, by reason
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   pay nothing unless they opt in
//! - Label values are backend ids and fixed enums; cardinality stays bounded

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const PROBE_TOTAL: &str = "replica_router_probe_total";
pub const HEALTH_CACHE_HITS_TOTAL: &str = "replica_router_health_cache_hits_total";
pub const BACKEND_ACTIVE: &str = "replica_router_backend_active";
pub const FALLBACK_TOTAL: &str = "replica_router_fallback_total";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe() {
    metrics::describe_counter!(PROBE_TOTAL, "Health probes issued against backends");
    metrics::describe_counter!(
        HEALTH_CACHE_HITS_TOTAL,
        "Health checks answered from the negative cache"
    );
    metrics::describe_gauge!(BACKEND_ACTIVE, "Whether a backend is in its active list");
    metrics::describe_counter!(FALLBACK_TOTAL, "Backend selections that used a fallback");
}

pub fn record_probe(kind: &str, healthy: bool) {
    let result = if healthy { "ok" } else { "failed" };
    metrics::counter!(PROBE_TOTAL, "kind" => kind.to_string(), "result" => result).increment(1);
}

pub fn record_health_cache_hit(kind: &str) {
    metrics::counter!(HEALTH_CACHE_HITS_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn record_backend_active(backend: &str, role: &str, active: bool) {
    metrics::gauge!(
        BACKEND_ACTIVE,
        "backend" => backend.to_string(),
        "role" => role.to_string()
    )
    .set(if active { 1.0 } else { 0.0 });
}

pub fn record_fallback(reason: &str) {
    metrics::counter!(FALLBACK_TOTAL, "reason" => reason.to_string()).increment(1);
}
