//! Background failover monitor.
//!
//! # Responsibilities
//! - Periodically probe every replica (and optionally every primary)
//! - Move failing backends to the deactivated list of their group
//! - Reactivate deactivated backends once they answer again
//!
//! # Design Decisions
//! - Sweeps are synchronous and run on the blocking pool; probes may block
//! - A stop flag is consulted between backends so a stop never waits for
//!   a whole sweep
//! - The monitor owns no state of its own; everything it learns is
//!   published through [`BackendSet`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::schema::MonitorConfig;
use crate::error::{RoutingError, RoutingResult};
use crate::health::cache::{CheckKind, LocalHealthCache};
use crate::health::checker::{HealthChecker, ProbeOptions};
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::backend::BackendId;
use crate::load_balancer::BackendSet;
use crate::routing::router::ReplicationRouter;

/// Transitions made by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deactivated: Vec<BackendId>,
    pub activated: Vec<BackendId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.deactivated.is_empty() && self.activated.is_empty()
    }
}

pub struct FailoverMonitor {
    backends: Arc<BackendSet>,
    checker: HealthChecker,
    interval: Duration,
    check_primary: bool,
    attempts: u32,
    stopping: Arc<AtomicBool>,
}

impl FailoverMonitor {
    pub fn new(
        backends: Arc<BackendSet>,
        checker: HealthChecker,
        config: &MonitorConfig,
        attempts: u32,
    ) -> RoutingResult<Self> {
        if attempts == 0 {
            return Err(RoutingError::InvalidConfiguration(
                "number of probe attempts must be >= 1".to_string(),
            ));
        }
        let interval = config.interval();
        if interval.is_zero() {
            return Err(RoutingError::InvalidConfiguration(
                "monitor.interval_ms must be > 0".to_string(),
            ));
        }

        Ok(Self {
            backends,
            checker,
            interval,
            check_primary: config.check_primary,
            attempts,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Monitor sharing the router's backend set and checker.
    pub fn for_router(router: &ReplicationRouter) -> RoutingResult<Self> {
        let config = router.config();
        Self::new(
            Arc::clone(router.backends()),
            router.checker().clone(),
            &config.monitor,
            config.health.attempts,
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep over every database group.
    pub fn check(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for group in self.backends.groups() {
            if self.stopped() {
                break;
            }
            self.check_replicas(&group.name, &mut report);
            if self.check_primary {
                self.check_primaries(&group.name, &mut report);
            }
        }

        if !report.is_empty() {
            tracing::info!(
                deactivated = ?report.deactivated,
                activated = ?report.activated,
                "Failover sweep changed backend state"
            );
        }
        report
    }

    fn check_replicas(&self, database: &str, report: &mut SweepReport) {
        let Some(state) = self.backends.state(Some(database)) else {
            return;
        };

        let mut just_deactivated = Vec::new();
        for replica in &state.active_replicas {
            if self.stopped() {
                return;
            }
            tracing::debug!(database = %database, backend = %replica, "Check replica still alive");
            if !self.is_alive(replica) {
                self.backends.deactivate_replica(database, replica);
                report.deactivated.push(replica.clone());
                just_deactivated.push(replica.clone());
            }
        }

        let Some(state) = self.backends.state(Some(database)) else {
            return;
        };
        for replica in &state.deactivated_replicas {
            if self.stopped() {
                return;
            }
            if just_deactivated.contains(replica) {
                continue;
            }
            tracing::debug!(database = %database, backend = %replica, "Check replica alive again");
            if self.is_alive(replica) && self.backends.activate_replica(database, replica) {
                report.activated.push(replica.clone());
            }
        }
    }

    fn check_primaries(&self, database: &str, report: &mut SweepReport) {
        let Some(group) = self.backends.group(Some(database)) else {
            return;
        };
        let Some(state) = self.backends.state(Some(database)) else {
            return;
        };

        for primary in &group.primaries {
            if self.stopped() {
                return;
            }
            let alive = self.is_alive(primary);
            let active = state.active_primaries.contains(primary);
            if active && !alive {
                self.backends.deactivate_primary(database, primary);
                report.deactivated.push(primary.clone());
            } else if !active && alive && self.backends.activate_primary(database, primary) {
                report.activated.push(primary.clone());
            }
        }
    }

    fn is_alive(&self, backend: &BackendId) -> bool {
        // Each sweep sees the live answer; failures are not debounced here.
        let opts = ProbeOptions::uncached(self.attempts);
        match self
            .checker
            .probe_with(&mut LocalHealthCache::new(), backend, CheckKind::Liveness, &opts)
        {
            Ok(alive) => alive,
            Err(e) => {
                tracing::error!(backend = %backend, error = %e, "Liveness check rejected");
                false
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    /// Spawn the sweep loop onto the current Tokio runtime.
    pub fn start(self) -> MonitorHandle {
        let shutdown = Shutdown::new();
        let mut shutdown_rx = shutdown.subscribe();
        let stopping = Arc::clone(&self.stopping);
        let interval = self.interval;
        let monitor = Arc::new(self);

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            check_primary = monitor.check_primary,
            "Failover monitor starting"
        );

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let sweeper = Arc::clone(&monitor);
                        let sweep = tokio::task::spawn_blocking(move || sweeper.check());
                        tokio::select! {
                            result = sweep => {
                                if let Err(e) = result {
                                    tracing::error!(error = %e, "Failover sweep panicked");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                tracing::info!("Failover monitor stopped during sweep");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Failover monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });

        MonitorHandle {
            shutdown,
            stopping,
            interval,
            task,
        }
    }
}

impl std::fmt::Debug for FailoverMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverMonitor")
            .field("interval", &self.interval)
            .field("check_primary", &self.check_primary)
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// Handle to a running monitor.
///
/// Dropping the handle closes the shutdown channel, which also ends the
/// loop; [`MonitorHandle::stop`] additionally waits for it.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: Shutdown,
    stopping: Arc<AtomicBool>,
    interval: Duration,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop and wait up to twice the interval for it to exit.
    /// Returns `false` if the deadline passed first.
    pub async fn stop(self) -> bool {
        self.stopping.store(true, Ordering::Relaxed);
        self.shutdown.trigger();

        let deadline = self.interval * 2;
        match time::timeout(deadline, self.task).await {
            Ok(Ok(())) => {
                tracing::info!("Failover monitor stopped");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failover monitor task failed");
                true
            }
            Err(_) => {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "Failover monitor did not stop in time"
                );
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::health::cache::CacheScope;
    use crate::health::probe::{BackendProbe, ProbeError};
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Alive(Mutex<HashSet<String>>);

    impl Alive {
        fn set(&self, names: &[&str]) {
            *self.0.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        }
    }

    impl BackendProbe for Alive {
        fn is_alive(&self, backend: &BackendId) -> Result<bool, ProbeError> {
            Ok(self.0.lock().unwrap().contains(backend.as_str()))
        }
        fn is_writable(&self, _backend: &BackendId) -> Result<bool, ProbeError> {
            Ok(true)
        }
    }

    fn setup(check_primary: bool) -> (FailoverMonitor, Arc<BackendSet>, Arc<Alive>) {
        let config = RouterConfig {
            replicas: vec!["slave1".into(), "slave2".into()],
            ..RouterConfig::default()
        };
        let backends = Arc::new(BackendSet::from_config(&config));
        let probe = Arc::new(Alive::default());
        let checker = HealthChecker::new(probe.clone(), CacheScope::Process);
        let monitor_config = MonitorConfig {
            enabled: true,
            interval_ms: 50,
            check_primary,
        };
        let monitor = FailoverMonitor::new(Arc::clone(&backends), checker, &monitor_config, 1).unwrap();
        (monitor, backends, probe)
    }

    #[test]
    fn test_rejects_zero_attempts_and_interval() {
        let backends = Arc::new(BackendSet::from_config(&RouterConfig::default()));
        let checker = HealthChecker::new(Arc::new(Alive::default()), CacheScope::Process);

        let config = MonitorConfig::default();
        let err = FailoverMonitor::new(Arc::clone(&backends), checker.clone(), &config, 0).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidConfiguration(_)));

        let config = MonitorConfig {
            enabled: false,
            interval_ms: 0,
            check_primary: false,
        };
        let err = FailoverMonitor::new(backends, checker, &config, 1).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_sweep_deactivates_and_reactivates() {
        let (monitor, backends, probe) = setup(false);

        probe.set(&["slave1"]);
        let report = monitor.check();
        assert_eq!(report.deactivated, vec![BackendId::from("slave2")]);
        let state = backends.state(None).unwrap();
        assert_eq!(state.active_replicas, vec![BackendId::from("slave1")]);
        assert_eq!(state.deactivated_replicas, vec![BackendId::from("slave2")]);

        probe.set(&["slave1", "slave2"]);
        let report = monitor.check();
        assert_eq!(report.activated, vec![BackendId::from("slave2")]);
        let state = backends.state(None).unwrap();
        assert_eq!(
            state.active_replicas,
            vec![BackendId::from("slave1"), BackendId::from("slave2")]
        );
    }

    #[test]
    fn test_just_deactivated_not_rechecked() {
        let (monitor, backends, probe) = setup(false);
        probe.set(&[]);
        let report = monitor.check();
        assert_eq!(report.deactivated.len(), 2);
        assert!(report.activated.is_empty());
        assert!(backends.state(None).unwrap().active_replicas.is_empty());
    }

    #[test]
    fn test_primary_checked_only_when_enabled() {
        let (monitor, backends, probe) = setup(false);
        probe.set(&["slave1", "slave2"]);
        monitor.check();
        assert_eq!(backends.state(None).unwrap().active_primaries.len(), 1);

        let (monitor, backends, probe) = setup(true);
        probe.set(&["slave1"]);
        monitor.check();
        assert!(backends.state(None).unwrap().active_primaries.is_empty());

        probe.set(&["default"]);
        let report = monitor.check();
        assert!(report.activated.contains(&BackendId::from("default")));
        assert_eq!(
            backends.state(None).unwrap().active_primaries,
            vec![BackendId::from("default")]
        );
    }

    #[test]
    fn test_stopped_sweep_does_nothing() {
        let (monitor, backends, probe) = setup(true);
        probe.set(&[]);
        monitor.stopping.store(true, Ordering::Relaxed);
        assert!(monitor.check().is_empty());
        assert_eq!(backends.state(None).unwrap().active_replicas.len(), 2);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (monitor, backends, probe) = setup(false);
        probe.set(&["slave1"]);

        let handle = monitor.start();
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            backends.state(None).unwrap().active_replicas,
            vec![BackendId::from("slave1")]
        );

        assert!(handle.stop().await);
    }
}
