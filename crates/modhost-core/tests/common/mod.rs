//! Shared helpers for host integration tests.
//!
//! Test modules are compiled into the test binary and served through a
//! `StaticModuleSource`. Every module records its init/shutdown calls in a
//! global log; tests use unique module names and filter the log by name.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use modhost_core::{HostConfig, ModuleHost, StaticModuleSource};
use modhost_sdk::ModuleEntryPoints;
use parking_lot::Mutex;

static EVENTS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Append an entry such as `init:name` to the global log.
pub fn record(entry: impl Into<String>) {
    EVENTS.lock().push(entry.into());
}

/// Log entries whose name part (after the `:`) is one of `names`.
pub fn events_for(names: &[&str]) -> Vec<String> {
    EVENTS
        .lock()
        .iter()
        .filter(|entry| {
            entry
                .split_once(':')
                .map(|(_, name)| names.contains(&name))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Virtual path a static module is registered under.
pub fn module_path(name: &str) -> PathBuf {
    PathBuf::from(format!("static/{}", name))
}

/// Host over a fresh static source.
pub fn static_host(config: HostConfig) -> (ModuleHost, Arc<StaticModuleSource>) {
    let source = Arc::new(StaticModuleSource::new());
    let host = ModuleHost::with_source(config, source.clone()).expect("valid config");
    (host, source)
}

/// Host with a short unload timeout.
pub fn quick_host() -> (ModuleHost, Arc<StaticModuleSource>) {
    static_host(HostConfig::default().with_unload_timeout(Duration::from_millis(100)))
}

/// Register modules under [`module_path`] of their name.
pub fn register(source: &StaticModuleSource, modules: &[(&str, ModuleEntryPoints)]) {
    for (name, entry_points) in modules {
        source.register(module_path(name), *entry_points);
    }
}

/// Define a compiled-in test module.
///
/// ```ignore
/// test_module!(Consumer, "consumer", deps: ["provider"], host: ">=9", init: Err(...));
/// ```
macro_rules! test_module {
    (
        $ty:ident, $name:literal
        $(, deps: [$($dep:literal),* $(,)?])?
        $(, host: $req:literal)?
        $(, init: $init:expr)?
    ) => {
        pub struct $ty;

        impl $ty {
            pub const NAME: &'static str = $name;

            pub fn entry_points() -> modhost_sdk::ModuleEntryPoints {
                modhost_sdk::module_entry_points!($ty)
            }
        }

        impl modhost_sdk::Module for $ty {
            fn descriptor() -> modhost_sdk::RawModuleDescriptor {
                #[allow(unused_mut)]
                let mut desc = modhost_sdk::RawModuleDescriptor::new(
                    $name,
                    modhost_sdk::RawVersion::new(1, 0, 0),
                )
                .with_description("test module")
                .with_author("tests");
                $($(desc = desc.with_dependency($dep);)*)?
                $(desc = desc.with_host_requirement($req);)?
                desc
            }

            fn initialize() -> modhost_sdk::ModuleResult<()> {
                crate::common::record(format!("init:{}", $name));
                #[allow(unused_variables)]
                let result: modhost_sdk::ModuleResult<()> = Ok(());
                $(let result = $init;)?
                result
            }

            fn shutdown() -> modhost_sdk::ModuleResult<()> {
                crate::common::record(format!("shutdown:{}", $name));
                Ok(())
            }
        }
    };
}
