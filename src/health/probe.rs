//! Backend probes.
//!
//! # Responsibilities
//! - Define the seam through which the host answers "is X alive / writable"
//! - Provide a TCP-connect probe for deployments without a richer check
//!
//! # Design Decisions
//! - Probes are synchronous and own their timeouts
//! - A probe error means "not healthy"; the checker never propagates it

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::config::RouterConfig;
use crate::load_balancer::backend::BackendId;

/// Errors a probe implementation may report.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("no probe target configured for backend '{0}'")]
    UnknownBackend(BackendId),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Liveness and writability checks supplied by the host environment.
pub trait BackendProbe: Send + Sync {
    /// Can a connection to the backend be established?
    fn is_alive(&self, backend: &BackendId) -> Result<bool, ProbeError>;

    /// Does the backend accept writes?
    fn is_writable(&self, backend: &BackendId) -> Result<bool, ProbeError>;
}

#[derive(Debug, Clone)]
struct Target {
    address: String,
    resolved: Vec<SocketAddr>,
}

/// Probes backends by opening a TCP connection to their configured address.
///
/// Host names are resolved once, when the probe is built, so a probe is
/// bounded by the connect timeout alone. Writability cannot be observed at
/// this level and is reported the same as liveness.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    targets: HashMap<BackendId, Target>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addresses: HashMap<BackendId, String>, timeout: Duration) -> Self {
        let targets = addresses
            .into_iter()
            .map(|(backend, address)| {
                let resolved = match address.to_socket_addrs() {
                    Ok(addrs) => addrs.collect(),
                    Err(e) => {
                        tracing::warn!(backend = %backend, address = %address, error = %e, "Backend address did not resolve");
                        Vec::new()
                    }
                };
                (backend, Target { address, resolved })
            })
            .collect();
        Self { targets, timeout }
    }

    /// Collect `[backends.<id>] address` entries from the configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        let addresses = config
            .backends
            .iter()
            .filter_map(|(id, entry)| {
                entry
                    .address
                    .as_ref()
                    .map(|addr| (BackendId::new(id), addr.clone()))
            })
            .collect();
        Self::new(addresses, Duration::from_millis(config.health.probe_timeout_ms))
    }

    fn connect(&self, backend: &BackendId) -> Result<bool, ProbeError> {
        let target = self
            .targets
            .get(backend)
            .ok_or_else(|| ProbeError::UnknownBackend(backend.clone()))?;

        let mut last_err = None;
        for addr in &target.resolved {
            match TcpStream::connect_timeout(addr, self.timeout) {
                Ok(_stream) => return Ok(true),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    last_err = Some(ProbeError::Timeout(self.timeout));
                }
                Err(e) => last_err = Some(ProbeError::Io(e)),
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Err(ProbeError::Failed(format!("address '{}' did not resolve", target.address))),
        }
    }
}

impl BackendProbe for TcpProbe {
    fn is_alive(&self, backend: &BackendId) -> Result<bool, ProbeError> {
        tracing::debug!(backend = %backend, "TCP liveness probe");
        self.connect(backend)
    }

    fn is_writable(&self, backend: &BackendId) -> Result<bool, ProbeError> {
        self.connect(backend)
    }
}
