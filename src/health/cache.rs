//! Negative health cache.
//!
//! Remembers when a (backend, check) pair last failed so repeated probes of a
//! dead backend are suppressed for a cooldown window. Two scopes exist:
//! a process-wide map shared by every unit of work, and a per-unit map that
//! lives inside the execution context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::load_balancer::backend::BackendId;

/// Which check a health record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Liveness,
    Writability,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Liveness => "liveness",
            CheckKind::Writability => "writability",
        }
    }
}

/// Where failure records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// One map for the whole process.
    #[default]
    Process,
    /// One map per unit of work.
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HealthKey {
    pub backend: BackendId,
    pub kind: CheckKind,
}

impl HealthKey {
    pub fn new(backend: &BackendId, kind: CheckKind) -> Self {
        Self {
            backend: backend.clone(),
            kind,
        }
    }
}

/// Storage for last-failure timestamps.
pub trait HealthRecords {
    fn last_failure(&self, key: &HealthKey) -> Option<Instant>;
    fn record_failure(&mut self, key: HealthKey, at: Instant);
    fn clear(&mut self, key: &HealthKey);

    /// True if a failure younger than `ttl` is on record. Expired records
    /// are discarded.
    fn is_fresh_failure(&mut self, key: &HealthKey, ttl: Duration, now: Instant) -> bool {
        match self.last_failure(key) {
            Some(failed_at) if now.saturating_duration_since(failed_at) < ttl => true,
            Some(_) => {
                self.clear(key);
                false
            }
            None => false,
        }
    }
}

/// Process-wide cache. Cloning yields another handle to the same map.
///
/// Concurrent writers race with last-writer-wins semantics; the data is a
/// hint, not a correctness-critical value.
#[derive(Debug, Clone, Default)]
pub struct SharedHealthCache {
    inner: Arc<DashMap<HealthKey, Instant>>,
}

impl SharedHealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl HealthRecords for SharedHealthCache {
    fn last_failure(&self, key: &HealthKey) -> Option<Instant> {
        self.inner.get(key).map(|r| *r.value())
    }

    fn record_failure(&mut self, key: HealthKey, at: Instant) {
        self.inner.insert(key, at);
    }

    fn clear(&mut self, key: &HealthKey) {
        self.inner.remove(key);
    }
}

/// Cache owned by a single unit of work; needs no synchronization.
#[derive(Debug, Clone, Default)]
pub struct LocalHealthCache {
    inner: HashMap<HealthKey, Instant>,
}

impl LocalHealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl HealthRecords for LocalHealthCache {
    fn last_failure(&self, key: &HealthKey) -> Option<Instant> {
        self.inner.get(key).copied()
    }

    fn record_failure(&mut self, key: HealthKey, at: Instant) {
        self.inner.insert(key, at);
    }

    fn clear(&mut self, key: &HealthKey) {
        self.inner.remove(key);
    }
}
