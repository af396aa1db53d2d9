//! Integration tests for module descriptors and generated entry points.

use std::sync::atomic::{AtomicUsize, Ordering};

use modhost_sdk::abi::{read_fixed, MAX_NAME_LEN};
use modhost_sdk::prelude::*;

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

struct Sensor;

impl Module for Sensor {
    fn descriptor() -> RawModuleDescriptor {
        RawModuleDescriptor::new("sensor", RawVersion::new(2, 1, 0))
            .with_type(ModuleType::Driver)
            .with_author("Test Author")
            .with_dependency("bus")
            .with_dependency("clock")
    }

    fn initialize() -> ModuleResult<()> {
        INIT_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Failing;

impl Module for Failing {
    fn descriptor() -> RawModuleDescriptor {
        RawModuleDescriptor::new("failing", RawVersion::new(0, 1, 0))
    }

    fn initialize() -> ModuleResult<()> {
        Err(ModuleError::Status {
            code: 42,
            message: "no device".to_string(),
        })
    }
}

struct Panicking;

impl Module for Panicking {
    fn descriptor() -> RawModuleDescriptor {
        RawModuleDescriptor::new("panicking", RawVersion::new(0, 1, 0))
    }

    fn initialize() -> ModuleResult<()> {
        panic!("boom")
    }
}

#[test]
fn test_descriptor_fields() {
    let entry_points = module_entry_points!(Sensor);
    let mut desc = RawModuleDescriptor::zeroed();
    unsafe { (entry_points.get_info)(&mut desc) };

    assert_eq!(desc.abi_version, MODULE_ABI_VERSION);
    assert_eq!(read_fixed(&desc.name).unwrap(), "sensor");
    assert_eq!(desc.version, RawVersion::new(2, 1, 0));
    assert_eq!(ModuleType::from_raw(desc.module_type), Some(ModuleType::Driver));
    assert_eq!(read_fixed(&desc.author).unwrap(), "Test Author");

    let deps: Vec<&str> = desc
        .dependency_slots()
        .iter()
        .map(|slot| read_fixed(slot).unwrap())
        .collect();
    assert_eq!(deps, vec!["bus", "clock"]);
}

#[test]
fn test_initialize_sets_loaded_flag() {
    let entry_points = module_entry_points!(Sensor);
    let before = INIT_CALLS.load(Ordering::SeqCst);

    let status = unsafe { (entry_points.initialize)() };
    assert_eq!(status, STATUS_OK);
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), before + 1);

    let mut desc = RawModuleDescriptor::zeroed();
    unsafe { (entry_points.get_info)(&mut desc) };
    assert_eq!(desc.is_loaded, 1);
}

#[test]
fn test_initialize_error_status() {
    let entry_points = module_entry_points!(Failing);
    assert_eq!(unsafe { (entry_points.initialize)() }, 42);

    let mut desc = RawModuleDescriptor::zeroed();
    unsafe { (entry_points.get_info)(&mut desc) };
    assert_eq!(desc.is_loaded, 0);
}

#[test]
fn test_panic_does_not_cross_boundary() {
    let entry_points = module_entry_points!(Panicking);
    assert_eq!(unsafe { (entry_points.initialize)() }, STATUS_PANICKED);
}

#[test]
#[should_panic(expected = "exceeds")]
fn test_oversized_name_rejected() {
    let name = "n".repeat(MAX_NAME_LEN + 1);
    let _ = RawModuleDescriptor::new(&name, RawVersion::default());
}

#[test]
fn test_module_type_serializes_snake_case() {
    let json = serde_json::to_string(&ModuleType::Service).unwrap();
    assert_eq!(json, "\"service\"");
}
