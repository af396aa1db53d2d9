//! Directory scanning over compiled-in modules backed by placeholder files.

#[macro_use]
mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{events_for, quick_host};
use modhost_core::prelude::*;
use modhost_sdk::ModuleEntryPoints;

test_module!(DirProvider, "dir-provider");
test_module!(DirMiddle, "dir-middle", deps: ["dir-provider"]);
test_module!(DirConsumer, "dir-consumer", deps: ["dir-middle"]);
test_module!(DirOrphan, "dir-orphan", deps: ["dir-absent"]);
test_module!(DirSolo, "dir-solo");
test_module!(CfgModule, "cfg-module");

/// Create `file` in `dir` and serve `entry_points` under its path.
fn place(source: &StaticModuleSource, dir: &Path, file: &str, entry_points: ModuleEntryPoints) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, b"").unwrap();
    source.register(path.clone(), entry_points);
    path
}

#[test]
fn test_directory_loads_in_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    let (host, source) = quick_host();
    // file names sort opposite to dependency order
    place(&source, dir.path(), "a-consumer.mod", DirConsumer::entry_points());
    place(&source, dir.path(), "b-middle.mod", DirMiddle::entry_points());
    place(&source, dir.path(), "c-provider.mod", DirProvider::entry_points());
    std::fs::write(dir.path().join("README.txt"), b"not a module").unwrap();

    let report = host.load_directory(dir.path()).unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failed);
    let names: Vec<_> = report.loaded.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["dir-provider", "dir-middle", "dir-consumer"]);
    assert_eq!(
        events_for(&["dir-provider", "dir-middle", "dir-consumer"]),
        vec!["init:dir-provider", "init:dir-middle", "init:dir-consumer"]
    );
}

#[test]
fn test_directory_reports_unresolvable_modules() {
    let dir = tempfile::tempdir().unwrap();
    let (host, source) = quick_host();
    let orphan = place(&source, dir.path(), "orphan.mod", DirOrphan::entry_points());
    place(&source, dir.path(), "solo.mod", DirSolo::entry_points());

    let report = host.load_directory(dir.path()).unwrap();

    assert_eq!(report.loaded.len(), 1);
    assert_eq!(report.loaded[0].0, "dir-solo");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, orphan);
    assert!(matches!(
        report.failed[0].1,
        LoadError::UnresolvedDependency { ref missing, .. } if missing == &vec!["dir-absent".to_string()]
    ));
}

#[test]
fn test_missing_directory() {
    let (host, _source) = quick_host();
    assert!(matches!(
        host.load_directory("/definitely/not/here"),
        Err(LoadError::FileNotFound { .. })
    ));
}

#[test]
fn test_configured_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(StaticModuleSource::new());
    place(&source, dir.path(), "cfg.mod", CfgModule::entry_points());

    let config = HostConfig::default().with_module_dir(dir.path());
    let host = ModuleHost::with_source(config, source).unwrap();

    let results = host.load_configured_dirs();
    assert_eq!(results.len(), 1);
    let report = results[0].1.as_ref().unwrap();
    assert_eq!(report.loaded[0].0, "cfg-module");
    assert!(host.is_module_loaded("cfg-module"));
}
