//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use replica_router::{BackendId, BackendProbe, ProbeError, ReplicationRouter, RouterConfig};

/// Probe whose answers can be changed while routers use it.
///
/// Unlisted backends are alive and writable. Every call is counted per
/// backend.
#[derive(Default)]
pub struct ScriptedProbe {
    dead: Mutex<HashSet<String>>,
    read_only: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_dead(dead: &[&str]) -> Arc<Self> {
        let probe = Self::new();
        probe.set_dead(dead);
        probe
    }

    /// Replace the set of dead backends.
    pub fn set_dead(&self, dead: &[&str]) {
        *self.dead.lock().unwrap() = dead.iter().map(|d| d.to_string()).collect();
    }

    pub fn set_read_only(&self, backends: &[&str]) {
        *self.read_only.lock().unwrap() = backends.iter().map(|d| d.to_string()).collect();
    }

    pub fn calls(&self, backend: &str) -> usize {
        self.calls.lock().unwrap().get(backend).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn count(&self, backend: &BackendId) {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(backend.to_string()).or_default() += 1;
    }
}

impl BackendProbe for ScriptedProbe {
    fn is_alive(&self, backend: &BackendId) -> Result<bool, ProbeError> {
        self.count(backend);
        if self.dead.lock().unwrap().contains(backend.as_str()) {
            Err(ProbeError::Failed(format!("{backend} refused connection")))
        } else {
            Ok(true)
        }
    }

    fn is_writable(&self, backend: &BackendId) -> Result<bool, ProbeError> {
        self.count(backend);
        Ok(!self.read_only.lock().unwrap().contains(backend.as_str()))
    }
}

/// Default database with the given replicas and default settings otherwise.
pub fn config_with_replicas(replicas: &[&str]) -> RouterConfig {
    RouterConfig {
        replicas: replicas.iter().map(|r| r.to_string()).collect(),
        ..RouterConfig::default()
    }
}

pub fn router(config: RouterConfig, probe: Arc<ScriptedProbe>) -> ReplicationRouter {
    ReplicationRouter::from_config(config, probe).unwrap()
}

/// Start a TCP listener that accepts and immediately drops connections.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    addr
}

/// An address nothing listens on.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
