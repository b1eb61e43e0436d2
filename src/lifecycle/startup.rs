//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and build the backend set, checker and router
//! - Start the failover monitor when enabled
//!
//! # Design Decisions
//! - Fail fast: an invalid configuration is fatal
//! - The monitor is started explicitly and returned to the caller, who
//!   owns stopping it

use std::sync::Arc;

use crate::config::RouterConfig;
use crate::error::RoutingResult;
use crate::health::monitor::{FailoverMonitor, MonitorHandle};
use crate::health::probe::BackendProbe;
use crate::routing::router::ReplicationRouter;

/// A router plus the monitor feeding it, if any.
#[derive(Debug)]
pub struct Runtime {
    pub router: Arc<ReplicationRouter>,
    pub monitor: Option<MonitorHandle>,
}

impl Runtime {
    /// Stop the monitor, if running. Returns `false` if it missed its deadline.
    pub async fn shutdown(self) -> bool {
        match self.monitor {
            Some(handle) => handle.stop().await,
            None => true,
        }
    }
}

/// Build a router from `config`, starting the monitor if it is enabled.
///
/// Must be called within a Tokio runtime when the monitor is enabled.
pub fn build(config: RouterConfig, probe: Arc<dyn BackendProbe>) -> RoutingResult<Runtime> {
    let router = Arc::new(ReplicationRouter::from_config(config, probe)?);

    let monitor = if router.config().monitor.enabled {
        Some(FailoverMonitor::for_router(&router)?.start())
    } else {
        tracing::info!("Failover monitor disabled, selection probes on demand");
        None
    };

    let groups = router.backends().groups().count();
    tracing::info!(
        default_backend = %router.backends().default_backend(),
        databases = groups,
        monitored = monitor.is_some(),
        "Replica router ready"
    );

    Ok(Runtime { router, monitor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoutingError;
    use crate::health::probe::ProbeError;
    use crate::load_balancer::backend::BackendId;

    struct Down;

    impl BackendProbe for Down {
        fn is_alive(&self, _backend: &BackendId) -> Result<bool, ProbeError> {
            Err(ProbeError::Failed("connection refused".into()))
        }
        fn is_writable(&self, _backend: &BackendId) -> Result<bool, ProbeError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_build_without_monitor() {
        let runtime = build(RouterConfig::default(), Arc::new(Down)).unwrap();
        assert!(runtime.monitor.is_none());
        assert!(runtime.shutdown().await);
    }

    #[tokio::test]
    async fn test_build_with_monitor() {
        let mut config = RouterConfig {
            replicas: vec!["r1".into()],
            ..RouterConfig::default()
        };
        config.monitor.enabled = true;
        config.monitor.interval_ms = 20;

        let runtime = build(config, Arc::new(Down)).unwrap();
        assert!(runtime.monitor.is_some());
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(runtime.router.backends().state(None).unwrap().active_replicas.is_empty());
        assert!(runtime.shutdown().await);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = RouterConfig::default();
        config.health.attempts = 0;
        let err = build(config, Arc::new(Down)).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidConfiguration(_)));
    }
}
