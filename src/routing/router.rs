//! Backend selection.
//!
//! # Responsibilities
//! - Resolve the backend for a read or a write in the current unit of work
//! - Skip dead backends using the health checker (or the monitor's view)
//! - Pin every choice for the rest of the unit of work
//!
//! # Design Decisions
//! - Writes always resolve to a primary-class backend; reads resolve to one
//!   only in `Primary` mode
//! - Replica order is shuffled, primary order is the configured one
//! - Fallback precedence: pinned → live replica → live primary (if enabled)
//!   → default backend (never probed)
//! - With the failover monitor running, selection trusts the active set and
//!   does not probe at all

use std::sync::Arc;
use std::time::Duration;

use crate::config::validation::validate_config;
use crate::config::RouterConfig;
use crate::error::{RoutingError, RoutingResult};
use crate::health::cache::CheckKind;
use crate::health::checker::{HealthChecker, ProbeOptions};
use crate::health::probe::BackendProbe;
use crate::load_balancer::backend::{BackendId, DEFAULT_DATABASE};
use crate::load_balancer::{BackendSet, Configured, SelectionOrder, Shuffled};
use crate::observability::metrics;
use crate::routing::context::ExecutionContext;
use crate::routing::mode::RoutingMode;

/// Routing capability exposed to the database layer.
pub trait Router: Send + Sync {
    /// Backend for a read in `database` (the default database when `None`).
    fn resolve_read(
        &self,
        cx: &mut ExecutionContext,
        database: Option<&str>,
    ) -> RoutingResult<BackendId>;

    /// Backend for a write in `database`.
    fn resolve_write(
        &self,
        cx: &mut ExecutionContext,
        database: Option<&str>,
    ) -> RoutingResult<BackendId>;

    fn state(&self, cx: &ExecutionContext) -> RoutingMode {
        cx.current()
    }

    fn set_mode_change_enabled(&self, cx: &mut ExecutionContext, enabled: bool) {
        cx.set_mode_change_enabled(enabled);
    }

    /// Whether rows on `a` and `b` may reference each other.
    fn allow_relation(&self, a: &BackendId, b: &BackendId) -> bool;
}

/// Primary/replica router.
pub struct ReplicationRouter {
    config: Arc<RouterConfig>,
    backends: Arc<BackendSet>,
    checker: HealthChecker,
    replica_order: Box<dyn SelectionOrder>,
    primary_order: Box<dyn SelectionOrder>,
    /// Selection draws from the monitor's active set without probing.
    monitored: bool,
}

impl ReplicationRouter {
    /// Build a router over an existing backend set and checker.
    pub fn new(
        config: Arc<RouterConfig>,
        backends: Arc<BackendSet>,
        checker: HealthChecker,
    ) -> RoutingResult<Self> {
        validate_config(&config).map_err(|errors| {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            RoutingError::InvalidConfiguration(joined)
        })?;

        let monitored = config.monitor.enabled;
        Ok(Self {
            config,
            backends,
            checker,
            replica_order: Box::new(Shuffled),
            primary_order: Box::new(Configured),
            monitored,
        })
    }

    /// Build a router, its backend set and its checker from configuration.
    pub fn from_config(config: RouterConfig, probe: Arc<dyn BackendProbe>) -> RoutingResult<Self> {
        let backends = Arc::new(BackendSet::from_config(&config));
        let checker = HealthChecker::new(probe, config.health.cache_scope);
        Self::new(Arc::new(config), backends, checker)
    }

    /// Override whether selection trusts the monitor instead of probing.
    pub fn with_monitored(mut self, monitored: bool) -> Self {
        self.monitored = monitored;
        self
    }

    pub fn backends(&self) -> &Arc<BackendSet> {
        &self.backends
    }

    pub fn checker(&self) -> &HealthChecker {
        &self.checker
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// True when the default primary is down (or, with `select_read_only`,
    /// refuses writes), i.e. the service can only serve reads.
    pub fn is_service_read_only(&self, cx: &mut ExecutionContext) -> RoutingResult<bool> {
        let primary = self
            .backends
            .group(None)
            .and_then(|g| g.primaries.first().cloned())
            .unwrap_or_else(|| self.backends.default_backend().clone());

        let health = &self.config.health;
        let opts = ProbeOptions::new(
            Some(self.config.read_only_downtime_for(primary.as_str())),
            health.read_only_attempts,
        );

        if !self.checker.probe(cx.health_mut(), &primary, CheckKind::Liveness, &opts)? {
            return Ok(true);
        }
        if health.select_read_only {
            let writable = self
                .checker
                .probe(cx.health_mut(), &primary, CheckKind::Writability, &opts)?;
            return Ok(!writable);
        }
        Ok(false)
    }

    fn liveness_options(&self, backend: &BackendId) -> ProbeOptions {
        let ttl = self.config.downtime_for(backend.as_str());
        ProbeOptions::new((ttl > Duration::ZERO).then_some(ttl), self.config.health.attempts)
    }

    fn is_alive(&self, cx: &mut ExecutionContext, backend: &BackendId) -> RoutingResult<bool> {
        if self.monitored {
            return Ok(true);
        }
        let opts = self.liveness_options(backend);
        self.checker
            .probe(cx.health_mut(), backend, CheckKind::Liveness, &opts)
    }

    /// First live backend in `order`, if any.
    fn first_alive(
        &self,
        cx: &mut ExecutionContext,
        candidates: Vec<BackendId>,
    ) -> RoutingResult<Option<BackendId>> {
        for candidate in candidates {
            if self.is_alive(cx, &candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn choose_primary(&self, cx: &mut ExecutionContext, database: &str) -> RoutingResult<BackendId> {
        let default = self.backends.default_backend().clone();
        let Some(state) = self.backends.state(Some(database)) else {
            return Ok(default);
        };
        let primaries = &state.active_primaries;

        match primaries.len() {
            0 => {
                tracing::warn!(database = %database, fallback = %default, "No active primary");
                metrics::record_fallback("no_primary");
                Ok(default)
            }
            1 => Ok(primaries[0].clone()),
            _ => {
                if let Some(pinned) = cx.pinned(Some(database), RoutingMode::Primary).cloned() {
                    if primaries.contains(&pinned) && self.is_alive(cx, &pinned)? {
                        return Ok(pinned);
                    }
                }
                match self.first_alive(cx, self.primary_order.order(primaries))? {
                    Some(primary) => Ok(primary),
                    None => {
                        tracing::warn!(database = %database, fallback = %default, "No live primary");
                        metrics::record_fallback("no_live_primary");
                        Ok(default)
                    }
                }
            }
        }
    }

    /// Canonical name of the group `database` resolves to.
    fn database_name(&self, database: Option<&str>) -> String {
        self.backends
            .group(database)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
    }
}

impl Router for ReplicationRouter {
    fn resolve_write(
        &self,
        cx: &mut ExecutionContext,
        database: Option<&str>,
    ) -> RoutingResult<BackendId> {
        let mode = cx.current();
        if self.config.check_state_on_write && mode != RoutingMode::Primary {
            tracing::error!(unit_id = %cx.unit_id(), mode = %mode, "Write requested in replica mode");
            return Err(RoutingError::IllegalModeAccess { mode });
        }

        let database = self.database_name(database);
        let chosen = self.choose_primary(cx, &database)?;
        cx.pin(Some(&database), RoutingMode::Primary, chosen.clone());

        tracing::debug!(unit_id = %cx.unit_id(), database = %database, backend = %chosen, "Resolved write backend");
        Ok(chosen)
    }

    fn resolve_read(
        &self,
        cx: &mut ExecutionContext,
        database: Option<&str>,
    ) -> RoutingResult<BackendId> {
        if cx.current() == RoutingMode::Primary {
            return self.resolve_write(cx, database);
        }

        let database = self.database_name(database);
        if let Some(pinned) = cx.pinned(Some(&database), RoutingMode::Replica) {
            return Ok(pinned.clone());
        }

        let chosen = match self.backends.state(Some(&database)) {
            Some(state) => {
                let mut chosen = self.first_alive(cx, self.replica_order.order(&state.active_replicas))?;
                if chosen.is_none() && self.config.read_fallback_to_primaries {
                    tracing::debug!(database = %database, "No live replica, trying primaries");
                    chosen = self.first_alive(cx, self.replica_order.order(&state.active_primaries))?;
                    if chosen.is_some() {
                        metrics::record_fallback("primary");
                    }
                }
                chosen
            }
            None => None,
        };

        let chosen = chosen.unwrap_or_else(|| {
            let default = self.backends.default_backend().clone();
            tracing::warn!(database = %database, fallback = %default, "No live replica, using default backend");
            metrics::record_fallback("default");
            default
        });

        cx.pin(Some(&database), RoutingMode::Replica, chosen.clone());
        tracing::debug!(unit_id = %cx.unit_id(), database = %database, backend = %chosen, "Resolved read backend");
        Ok(chosen)
    }

    fn allow_relation(&self, a: &BackendId, b: &BackendId) -> bool {
        self.backends.allow_relation(a.as_str(), b.as_str())
    }
}

impl std::fmt::Debug for ReplicationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationRouter")
            .field("backends", &self.backends)
            .field("checker", &self.checker)
            .field("monitored", &self.monitored)
            .finish()
    }
}
