//! Failover monitor cycles and lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use replica_router::{
    BackendId, ExecutionContext, FailoverMonitor, Router, RouterConfig, RoutingMode,
};

mod common;

use common::ScriptedProbe;

fn monitored_config(check_primary: bool) -> RouterConfig {
    let mut config = common::config_with_replicas(&["slave1", "slave2"]);
    config.monitor.enabled = true;
    config.monitor.interval_ms = 20;
    config.monitor.check_primary = check_primary;
    config
}

fn active_replicas(router: &replica_router::ReplicationRouter) -> Vec<BackendId> {
    router.backends().state(None).unwrap().active_replicas.clone()
}

#[test]
fn test_thread_cycle() {
    let probe = ScriptedProbe::new();
    let router = common::router(monitored_config(false), probe.clone());
    let monitor = FailoverMonitor::for_router(&router).unwrap();

    // Only slave1 is alive.
    probe.set_dead(&["slave2"]);
    monitor.check();
    let state = router.backends().state(None).unwrap();
    assert_eq!(state.active_replicas, vec![BackendId::from("slave1")]);
    assert_eq!(state.deactivated_replicas, vec![BackendId::from("slave2")]);

    let mut cx = ExecutionContext::enter(RoutingMode::Primary);
    assert_eq!(router.resolve_write(&mut cx, None).unwrap(), "default");
    cx.push(RoutingMode::Replica);
    assert_eq!(router.resolve_read(&mut cx, None).unwrap(), "slave1");

    // Now only slave2 is alive.
    probe.set_dead(&["slave1"]);
    monitor.check();
    assert_eq!(active_replicas(&router), vec![BackendId::from("slave2")]);
    let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    assert_eq!(router.resolve_read(&mut cx, None).unwrap(), "slave2");

    // Both alive again.
    probe.set_dead(&[]);
    monitor.check();
    assert_eq!(
        active_replicas(&router),
        vec![BackendId::from("slave1"), BackendId::from("slave2")]
    );
    let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    let read = router.resolve_read(&mut cx, None).unwrap();
    assert!(read == "slave1" || read == "slave2");
}

#[test]
fn test_thread_cycle_with_primary_check() {
    let probe = ScriptedProbe::new();
    let router = common::router(monitored_config(true), probe.clone());
    let monitor = FailoverMonitor::for_router(&router).unwrap();

    probe.set_dead(&["default", "slave2"]);
    monitor.check();
    let state = router.backends().state(None).unwrap();
    assert!(state.active_primaries.is_empty());
    assert_eq!(state.active_replicas, vec![BackendId::from("slave1")]);

    // With no active primary, writes fall back to the default backend.
    let mut cx = ExecutionContext::enter(RoutingMode::Primary);
    assert_eq!(router.resolve_write(&mut cx, None).unwrap(), "default");
    cx.push(RoutingMode::Replica);
    assert_eq!(router.resolve_read(&mut cx, None).unwrap(), "slave1");

    probe.set_dead(&["default", "slave1"]);
    monitor.check();
    let state = router.backends().state(None).unwrap();
    assert!(state.active_primaries.is_empty());
    assert_eq!(state.active_replicas, vec![BackendId::from("slave2")]);
    let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    assert_eq!(router.resolve_read(&mut cx, None).unwrap(), "slave2");

    // Primary back, replicas down.
    probe.set_dead(&["slave1", "slave2"]);
    let report = monitor.check();
    assert_eq!(report.activated, vec![BackendId::from("default")]);
    let state = router.backends().state(None).unwrap();
    assert_eq!(state.active_primaries, vec![BackendId::from("default")]);
    assert!(state.active_replicas.is_empty());

    let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    assert_eq!(router.resolve_read(&mut cx, None).unwrap(), "default");
    cx.push(RoutingMode::Primary);
    assert_eq!(router.resolve_write(&mut cx, None).unwrap(), "default");
}

#[test]
fn test_monitored_selection_does_not_probe() {
    let probe = ScriptedProbe::with_dead(&["slave2"]);
    let router = common::router(monitored_config(false), probe.clone());

    let mut cx = ExecutionContext::enter(RoutingMode::Replica);
    router.resolve_read(&mut cx, None).unwrap();
    assert_eq!(probe.total_calls(), 0);
}

#[test]
fn test_transitions_visible_to_running_selectors() {
    let probe = ScriptedProbe::new();
    let router = Arc::new(common::router(monitored_config(false), probe.clone()));
    let monitor = FailoverMonitor::for_router(&router).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let router = Arc::clone(&router);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while !done.load(Ordering::SeqCst) {
                let mut cx = ExecutionContext::enter(RoutingMode::Replica);
                let backend = router.resolve_read(&mut cx, None).unwrap();
                if seen.last() != Some(&backend) {
                    seen.push(backend);
                }
            }
            seen
        })
    };

    probe.set_dead(&["slave1"]);
    monitor.check();
    thread::sleep(Duration::from_millis(20));
    probe.set_dead(&["slave2"]);
    monitor.check();
    thread::sleep(Duration::from_millis(20));
    done.store(true, Ordering::SeqCst);

    let seen = reader.join().unwrap();
    assert_eq!(seen.last().unwrap(), "slave1");
    assert!(seen.iter().any(|b| b == "slave2"));
}

#[tokio::test]
async fn test_thread_run() {
    let probe = ScriptedProbe::with_dead(&["default", "slave2"]);
    let runtime = replica_router::lifecycle::build(monitored_config(true), probe).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = runtime.router.backends().state(None).unwrap();
    assert_eq!(state.active_replicas, vec![BackendId::from("slave1")]);
    assert_eq!(state.deactivated_replicas, vec![BackendId::from("slave2")]);
    assert!(state.active_primaries.is_empty());

    assert!(runtime.shutdown().await);
}
