//! Concurrent loads, in-flight calls and safe unload.

#[macro_use]
mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{events_for, module_path, quick_host, record, register, static_host};
use modhost_core::prelude::*;
use modhost_sdk::ModuleEntryPoints;

test_module!(Par0, "par-0");
test_module!(Par1, "par-1");
test_module!(Par2, "par-2");
test_module!(Par3, "par-3");
test_module!(Par4, "par-4");
test_module!(Par5, "par-5");
test_module!(Par6, "par-6");
test_module!(Par7, "par-7");
test_module!(InFlight, "in-flight");
test_module!(Stuck, "stuck");
test_module!(Panicky, "panicky");
test_module!(Churn, "churn");
test_module!(Stable, "stable");

#[test]
fn test_concurrent_loads() {
    let modules: Vec<(&str, ModuleEntryPoints)> = vec![
        (Par0::NAME, Par0::entry_points()),
        (Par1::NAME, Par1::entry_points()),
        (Par2::NAME, Par2::entry_points()),
        (Par3::NAME, Par3::entry_points()),
        (Par4::NAME, Par4::entry_points()),
        (Par5::NAME, Par5::entry_points()),
        (Par6::NAME, Par6::entry_points()),
        (Par7::NAME, Par7::entry_points()),
    ];
    let (host, source) = quick_host();
    register(&source, &modules);
    let host = Arc::new(host);

    let handles: Vec<_> = modules
        .iter()
        .map(|(name, _)| {
            let host = host.clone();
            let path = module_path(name);
            thread::spawn(move || host.load_module(path))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let mut names = host.loaded_module_names();
    names.sort();
    let mut expected: Vec<_> = modules.iter().map(|(n, _)| n.to_string()).collect();
    expected.sort();
    assert_eq!(names, expected);
    assert!(host
        .list_modules()
        .iter()
        .all(|d| host.module_state(&d.name) == Some(ModuleState::Running)));
}

#[test]
fn test_unload_waits_for_in_flight_call() {
    let (host, source) = static_host(
        HostConfig::default().with_unload_timeout(Duration::from_secs(10)),
    );
    register(&source, &[(InFlight::NAME, InFlight::entry_points())]);
    host.load_module(module_path(InFlight::NAME)).unwrap();
    let host = Arc::new(host);

    let call = host.acquire("in-flight").unwrap();
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        record("call-done:in-flight");
        drop(call);
    });

    let start = Instant::now();
    host.unload_module("in-flight").unwrap();
    assert!(start.elapsed() >= Duration::from_millis(100));
    worker.join().unwrap();

    assert_eq!(
        events_for(&["in-flight"]),
        vec![
            "init:in-flight",
            "call-done:in-flight",
            "shutdown:in-flight"
        ]
    );
    assert!(!host.is_module_loaded("in-flight"));
}

#[test]
fn test_unload_timeout_keeps_entry() {
    let (host, source) = quick_host();
    register(&source, &[(Stuck::NAME, Stuck::entry_points())]);
    host.load_module(module_path(Stuck::NAME)).unwrap();

    let call = host.acquire("stuck").unwrap();
    let err = host.unload_module("stuck").unwrap_err();
    match err {
        UnloadError::UnloadTimeout {
            name,
            active_calls,
            timeout,
        } => {
            assert_eq!(name, "stuck");
            assert_eq!(active_calls, 1);
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(host.is_module_loaded("stuck"));
    assert_eq!(host.module_state("stuck"), Some(ModuleState::ShuttingDown));
    assert!(matches!(
        host.acquire("stuck"),
        Err(CallError::ModuleUnloading {
            state: ModuleState::ShuttingDown,
            ..
        })
    ));
    assert_eq!(events_for(&["stuck"]), vec!["init:stuck"]);

    drop(call);
    host.unload_module("stuck").unwrap();
    assert_eq!(events_for(&["stuck"]), vec!["init:stuck", "shutdown:stuck"]);
}

#[test]
fn test_guard_released_on_panic() {
    let (host, source) = quick_host();
    register(&source, &[(Panicky::NAME, Panicky::entry_points())]);
    host.load_module(module_path(Panicky::NAME)).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        host.with_module("panicky", |_call| panic!("caller bug"))
    }));
    assert!(result.is_err());
    assert_eq!(host.active_calls("panicky"), Some(0));

    host.unload_module("panicky").unwrap();
}

#[test]
fn test_readers_see_consistent_snapshots() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (Churn::NAME, Churn::entry_points()),
            (Stable::NAME, Stable::entry_points()),
        ],
    );
    host.load_module(module_path(Stable::NAME)).unwrap();
    let host = Arc::new(host);
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let host = host.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut observations = 0usize;
                loop {
                    let modules = host.list_modules();
                    assert_eq!(modules[0].name, "stable");
                    assert!(modules.len() == 1 || modules.len() == 2);
                    if let Ok(call) = host.acquire("churn") {
                        assert_eq!(call.name(), "churn");
                    }
                    observations += 1;
                    if stop.load(Ordering::Relaxed) {
                        break observations;
                    }
                }
            })
        })
        .collect();

    for _ in 0..50 {
        host.load_module(module_path(Churn::NAME)).unwrap();
        host.unload_module("churn").unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(host.loaded_module_names(), vec!["stable"]);
}
