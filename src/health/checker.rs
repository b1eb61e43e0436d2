//! Debounced health checking.
//!
//! # Responsibilities
//! - Run a liveness or writability probe with bounded retries
//! - Skip probing a backend that failed within the cache TTL
//! - Record failures and clear them on success
//!
//! # Design Decisions
//! - A probe that errors is a probe that said "no"; nothing propagates
//! - Liveness and writability results are cached independently
//! - A zero attempt count is a configuration error, not "one attempt"

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{RoutingError, RoutingResult};
use crate::health::cache::{
    CacheScope, CheckKind, HealthKey, HealthRecords, LocalHealthCache, SharedHealthCache,
};
use crate::health::probe::BackendProbe;
use crate::load_balancer::backend::BackendId;
use crate::observability::metrics;

/// Parameters of a single `probe` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Negative-cache window. `None` disables the debounce.
    pub cache_ttl: Option<Duration>,
    pub max_attempts: u32,
    /// Probe even if a fresh failure is on record.
    pub force: bool,
}

impl ProbeOptions {
    pub fn new(cache_ttl: Option<Duration>, max_attempts: u32) -> Self {
        Self {
            cache_ttl,
            max_attempts,
            force: false,
        }
    }

    /// Options without debounce, used by the background monitor.
    pub fn uncached(max_attempts: u32) -> Self {
        Self::new(None, max_attempts)
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Runs probes through the negative cache.
#[derive(Clone)]
pub struct HealthChecker {
    probe: Arc<dyn BackendProbe>,
    scope: CacheScope,
    shared: SharedHealthCache,
}

impl HealthChecker {
    pub fn new(probe: Arc<dyn BackendProbe>, scope: CacheScope) -> Self {
        Self {
            probe,
            scope,
            shared: SharedHealthCache::new(),
        }
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// The process-wide cache (unused when scope is `Unit`).
    pub fn shared_cache(&self) -> &SharedHealthCache {
        &self.shared
    }

    /// Probe `backend`, using either the process cache or `local` depending
    /// on the configured scope.
    pub fn probe(
        &self,
        local: &mut LocalHealthCache,
        backend: &BackendId,
        kind: CheckKind,
        opts: &ProbeOptions,
    ) -> RoutingResult<bool> {
        match self.scope {
            CacheScope::Process => {
                let mut shared = self.shared.clone();
                self.probe_with(&mut shared, backend, kind, opts)
            }
            CacheScope::Unit => self.probe_with(local, backend, kind, opts),
        }
    }

    /// Probe `backend` against an explicit record store.
    pub fn probe_with<R: HealthRecords + ?Sized>(
        &self,
        records: &mut R,
        backend: &BackendId,
        kind: CheckKind,
        opts: &ProbeOptions,
    ) -> RoutingResult<bool> {
        if opts.max_attempts == 0 {
            return Err(RoutingError::InvalidConfiguration(
                "number of probe attempts must be >= 1".to_string(),
            ));
        }

        let key = HealthKey::new(backend, kind);
        let now = Instant::now();

        match opts.cache_ttl {
            Some(ttl) if !opts.force => {
                if records.is_fresh_failure(&key, ttl, now) {
                    tracing::debug!(
                        backend = %backend,
                        kind = kind.as_str(),
                        ttl_secs = ttl.as_secs_f64(),
                        "Last check failed within cache window, no check needed"
                    );
                    metrics::record_health_cache_hit(kind.as_str());
                    return Ok(false);
                }
            }
            _ if opts.force => {
                tracing::debug!(backend = %backend, kind = kind.as_str(), "Force check");
            }
            _ => {}
        }

        let mut healthy = false;
        for attempt in 1..=opts.max_attempts {
            tracing::debug!(backend = %backend, kind = kind.as_str(), attempt, "Trying to check backend");

            healthy = match self.run_probe(backend, kind) {
                Ok(result) => result,
                Err(e) => {
                    if attempt == opts.max_attempts {
                        tracing::warn!(backend = %backend, kind = kind.as_str(), error = %e, "Error verifying backend");
                    } else {
                        tracing::debug!(backend = %backend, kind = kind.as_str(), error = %e, "Probe error, retrying");
                    }
                    false
                }
            };

            if healthy {
                tracing::debug!(backend = %backend, kind = kind.as_str(), attempt, "Backend check succeeded");
                break;
            }
        }

        metrics::record_probe(kind.as_str(), healthy);

        if healthy {
            records.clear(&key);
        } else {
            tracing::warn!(
                backend = %backend,
                kind = kind.as_str(),
                attempts = opts.max_attempts,
                "Backend check failed"
            );
            records.record_failure(key, Instant::now());
        }

        Ok(healthy)
    }

    fn run_probe(&self, backend: &BackendId, kind: CheckKind) -> Result<bool, crate::health::probe::ProbeError> {
        match kind {
            CheckKind::Liveness => self.probe.is_alive(backend),
            CheckKind::Writability => self.probe.is_writable(backend),
        }
    }
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("scope", &self.scope)
            .field("shared_records", &self.shared.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::ProbeError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted answers and counts calls.
    #[derive(Default)]
    struct Scripted {
        answers: Mutex<VecDeque<Result<bool, ProbeError>>>,
        fallback: bool,
        calls: AtomicUsize,
        writable_calls: AtomicUsize,
    }

    impl Scripted {
        fn new(answers: Vec<Result<bool, ProbeError>>, fallback: bool) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                fallback,
                ..Default::default()
            })
        }

        fn next(&self) -> Result<bool, ProbeError> {
            self.answers.lock().unwrap().pop_front().unwrap_or(Ok(self.fallback))
        }
    }

    impl BackendProbe for Scripted {
        fn is_alive(&self, _backend: &BackendId) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.next()
        }

        fn is_writable(&self, _backend: &BackendId) -> Result<bool, ProbeError> {
            self.writable_calls.fetch_add(1, Ordering::SeqCst);
            self.next()
        }
    }

    fn checker(probe: Arc<Scripted>) -> HealthChecker {
        HealthChecker::new(probe, CacheScope::Process)
    }

    #[test]
    fn test_success_and_failure() {
        let mut local = LocalHealthCache::new();
        let ok = checker(Scripted::new(vec![], true));
        assert!(ok.probe(&mut local, &"default".into(), CheckKind::Liveness, &ProbeOptions::uncached(1)).unwrap());

        let bad = checker(Scripted::new(vec![], false));
        assert!(!bad.probe(&mut local, &"default".into(), CheckKind::Liveness, &ProbeOptions::uncached(1)).unwrap());
    }

    #[test]
    fn test_retries_until_success() {
        let probe = Scripted::new(vec![Ok(false), Ok(false)], true);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();

        let alive = checker
            .probe(&mut local, &"r1".into(), CheckKind::Liveness, &ProbeOptions::uncached(3))
            .unwrap();
        assert!(alive);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert!(checker.shared_cache().is_empty());
    }

    #[test]
    fn test_all_attempts_fail() {
        let probe = Scripted::new(vec![], false);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();

        let alive = checker
            .probe(&mut local, &"r1".into(), CheckKind::Liveness, &ProbeOptions::uncached(3))
            .unwrap();
        assert!(!alive);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_probe_error_is_absorbed() {
        let probe = Scripted::new(vec![Err(ProbeError::Failed("boom".into()))], true);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();

        let opts = ProbeOptions::uncached(1);
        assert_eq!(checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts), Ok(false));
        assert_eq!(checker.shared_cache().len(), 1);

        // Error then success within the attempt budget.
        let probe = Scripted::new(vec![Err(ProbeError::Timeout(Duration::from_millis(5)))], true);
        let checker = self::checker(probe.clone());
        assert_eq!(
            checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &ProbeOptions::uncached(2)),
            Ok(true)
        );
    }

    #[test]
    fn test_cached_failure_skips_probe() {
        let probe = Scripted::new(vec![], false);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();
        let opts = ProbeOptions::new(Some(Duration::from_secs(10)), 1);

        assert!(!checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts).unwrap());
        assert!(!checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts).unwrap());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        // Forcing bypasses the cache.
        assert!(!checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts.forced()).unwrap());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let probe = Scripted::new(vec![Ok(false)], true);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();
        let opts = ProbeOptions::new(Some(Duration::from_millis(40)), 1);

        assert!(!checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts).unwrap());
        assert!(!checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts).unwrap());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(80));

        assert!(checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &opts).unwrap());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert!(checker.shared_cache().is_empty());
    }

    #[test]
    fn test_unit_scope_uses_local_cache() {
        let probe = Scripted::new(vec![], false);
        let checker = HealthChecker::new(probe.clone(), CacheScope::Unit);
        let opts = ProbeOptions::new(Some(Duration::from_secs(10)), 1);

        let mut first = LocalHealthCache::new();
        checker.probe(&mut first, &"r1".into(), CheckKind::Liveness, &opts).unwrap();
        checker.probe(&mut first, &"r1".into(), CheckKind::Liveness, &opts).unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.len(), 1);
        assert!(checker.shared_cache().is_empty());

        // A fresh unit of work does not inherit the record.
        let mut second = LocalHealthCache::new();
        checker.probe(&mut second, &"r1".into(), CheckKind::Liveness, &opts).unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_writability_cached_separately() {
        let probe = Scripted::new(vec![Ok(false)], true);
        let checker = checker(probe.clone());
        let mut local = LocalHealthCache::new();
        let opts = ProbeOptions::new(Some(Duration::from_secs(10)), 1);

        assert!(!checker.probe(&mut local, &"p1".into(), CheckKind::Writability, &opts).unwrap());
        assert!(checker.probe(&mut local, &"p1".into(), CheckKind::Liveness, &opts).unwrap());
        assert!(!checker.probe(&mut local, &"p1".into(), CheckKind::Writability, &opts).unwrap());
        assert_eq!(probe.writable_calls.load(Ordering::SeqCst), 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let checker = checker(Scripted::new(vec![], true));
        let mut local = LocalHealthCache::new();
        let result = checker.probe(&mut local, &"r1".into(), CheckKind::Liveness, &ProbeOptions::uncached(0));
        assert!(matches!(result, Err(RoutingError::InvalidConfiguration(_))));
    }
}
