//! Sample module.
//!
//! Build with `cargo build -p modhost-sample-module`, then:
//!
//! ```text
//! modhost inspect target/debug/libmodhost_sample_module.so
//! modhost load target/debug/libmodhost_sample_module.so
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use modhost_sdk::prelude::*;

static CALLS: AtomicU64 = AtomicU64::new(0);

pub struct SampleModule;

impl Module for SampleModule {
    fn descriptor() -> RawModuleDescriptor {
        RawModuleDescriptor::new("SampleModule", RawVersion::new(1, 0, 0))
            .with_type(ModuleType::Plugin)
            .with_description("Sample module demonstrating the module ABI")
            .with_author("modhost Contributors")
            .with_host_requirement("^0.1")
    }

    fn initialize() -> ModuleResult<()> {
        CALLS.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn shutdown() -> ModuleResult<()> {
        Ok(())
    }
}

export_module!(SampleModule);

/// Add two numbers. Exported for hosts to call through a module guard.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn sampleAdd(a: i32, b: i32) -> i32 {
    CALLS.fetch_add(1, Ordering::Relaxed);
    a.wrapping_add(b)
}

/// Number of `sampleAdd` calls since initialization.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn sampleCallCount() -> u64 {
    CALLS.load(Ordering::Relaxed)
}
