//! Shutdown-all, reload-all and host drop.

#[macro_use]
mod common;

use common::{events_for, module_path, quick_host, register};
use modhost_core::prelude::*;
use modhost_core::ReloadError;

test_module!(ChainA, "chain-a");
test_module!(ChainB, "chain-b", deps: ["chain-a"]);
test_module!(ChainC, "chain-c", deps: ["chain-b"]);
test_module!(BusyBase, "busy-base");
test_module!(BusyTop, "busy-top", deps: ["busy-base"]);
test_module!(Dropped, "dropped");
test_module!(ReloadOne, "reload-one");
test_module!(ReloadTwo, "reload-two", deps: ["reload-one"]);
test_module!(VanishFirst, "vanish-first");
test_module!(VanishSecond, "vanish-second");
test_module!(VanishThird, "vanish-third", deps: ["vanish-first"]);
test_module!(PinnedA, "pinned-a");
test_module!(PinnedB, "pinned-b");

#[test]
fn test_shutdown_all_reverse_order() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (ChainA::NAME, ChainA::entry_points()),
            (ChainB::NAME, ChainB::entry_points()),
            (ChainC::NAME, ChainC::entry_points()),
        ],
    );
    for name in [ChainA::NAME, ChainB::NAME, ChainC::NAME] {
        host.load_module(module_path(name)).unwrap();
    }

    host.shutdown_all().unwrap();

    assert!(host.list_modules().is_empty());
    assert_eq!(
        events_for(&["chain-a", "chain-b", "chain-c"]),
        vec![
            "init:chain-a",
            "init:chain-b",
            "init:chain-c",
            "shutdown:chain-c",
            "shutdown:chain-b",
            "shutdown:chain-a",
        ]
    );
}

#[test]
fn test_shutdown_all_aggregates_failures() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (BusyBase::NAME, BusyBase::entry_points()),
            (BusyTop::NAME, BusyTop::entry_points()),
        ],
    );
    host.load_module(module_path(BusyBase::NAME)).unwrap();
    host.load_module(module_path(BusyTop::NAME)).unwrap();

    let call = host.acquire("busy-top").unwrap();
    let err = host.shutdown_all().unwrap_err();

    assert_eq!(err.failures.len(), 2);
    assert_eq!(err.failures[0].0, "busy-top");
    assert!(matches!(err.failures[0].1, UnloadError::UnloadTimeout { .. }));
    assert_eq!(err.failures[1].0, "busy-base");
    assert!(matches!(
        err.failures[1].1,
        UnloadError::UnresolvedDependents { .. }
    ));
    assert_eq!(host.loaded_module_names(), vec!["busy-base", "busy-top"]);

    drop(call);
    host.shutdown_all().unwrap();
    assert!(host.list_modules().is_empty());
    assert_eq!(
        events_for(&["busy-base", "busy-top"]),
        vec![
            "init:busy-base",
            "init:busy-top",
            "shutdown:busy-top",
            "shutdown:busy-base",
        ]
    );
}

#[test]
fn test_drop_shuts_modules_down() {
    {
        let (host, source) = quick_host();
        register(&source, &[(Dropped::NAME, Dropped::entry_points())]);
        host.load_module(module_path(Dropped::NAME)).unwrap();
    }
    assert_eq!(
        events_for(&["dropped"]),
        vec!["init:dropped", "shutdown:dropped"]
    );
}

#[test]
fn test_reload_all() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (ReloadOne::NAME, ReloadOne::entry_points()),
            (ReloadTwo::NAME, ReloadTwo::entry_points()),
        ],
    );
    host.load_module(module_path(ReloadOne::NAME)).unwrap();
    host.load_module(module_path(ReloadTwo::NAME)).unwrap();

    let names = host.reload_all().unwrap();
    assert_eq!(names, vec!["reload-one", "reload-two"]);
    assert_eq!(
        events_for(&["reload-one", "reload-two"]),
        vec![
            "init:reload-one",
            "init:reload-two",
            "shutdown:reload-two",
            "shutdown:reload-one",
            "init:reload-one",
            "init:reload-two",
        ]
    );
}

#[test]
fn test_reload_all_continues_past_load_failures() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (VanishFirst::NAME, VanishFirst::entry_points()),
            (VanishSecond::NAME, VanishSecond::entry_points()),
            (VanishThird::NAME, VanishThird::entry_points()),
        ],
    );
    for name in [VanishFirst::NAME, VanishSecond::NAME, VanishThird::NAME] {
        host.load_module(module_path(name)).unwrap();
    }
    assert!(source.unregister(&module_path(VanishFirst::NAME)));

    let err = host.reload_all().unwrap_err();
    let ReloadError::Incomplete { loaded, failures } = err else {
        panic!("expected an incomplete reload");
    };

    assert_eq!(loaded, vec!["vanish-second"]);
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, module_path("vanish-first"));
    assert!(matches!(failures[0].1, LoadError::FileNotFound { .. }));
    assert_eq!(failures[1].0, module_path("vanish-third"));
    assert!(matches!(
        failures[1].1,
        LoadError::UnresolvedDependency { .. }
    ));
    assert_eq!(host.loaded_module_names(), vec!["vanish-second"]);
}

#[test]
fn test_reload_all_restores_after_unload_failure() {
    let (host, source) = quick_host();
    register(
        &source,
        &[
            (PinnedA::NAME, PinnedA::entry_points()),
            (PinnedB::NAME, PinnedB::entry_points()),
        ],
    );
    host.load_module(module_path(PinnedA::NAME)).unwrap();
    host.load_module(module_path(PinnedB::NAME)).unwrap();

    let call = host.acquire("pinned-a").unwrap();
    let err = host.reload_all().unwrap_err();

    assert!(matches!(
        err,
        ReloadError::Unload(UnloadError::UnloadTimeout { .. })
    ));
    assert!(host.is_module_loaded("pinned-b"));
    assert_eq!(host.module_state("pinned-b"), Some(ModuleState::Running));
    assert_eq!(
        host.module_state("pinned-a"),
        Some(ModuleState::ShuttingDown)
    );
    assert_eq!(
        events_for(&["pinned-a", "pinned-b"]),
        vec![
            "init:pinned-a",
            "init:pinned-b",
            "shutdown:pinned-b",
            "init:pinned-b",
        ]
    );

    drop(call);
    host.shutdown_all().unwrap();
    assert!(host.list_modules().is_empty());
}
