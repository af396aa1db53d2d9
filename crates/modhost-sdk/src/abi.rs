//! Module ABI definition.
//!
//! This module defines the fixed-layout descriptor and the entry point
//! signatures that every native module must export. The host and the module
//! may be compiled by different toolchains, so everything here is plain
//! `#[repr(C)]` data: no pointers the host has to free, no vtables, no Rust
//! containers.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Current module ABI version.
/// Modules must fill their descriptor with this version to be loaded.
pub const MODULE_ABI_VERSION: u32 = 1;

/// Capacity of the name, author and dependency name fields (bytes, UTF-8).
pub const MAX_NAME_LEN: usize = 64;

/// Capacity of the description field (bytes, UTF-8).
pub const MAX_DESCRIPTION_LEN: usize = 256;

/// Capacity of the host version requirement field (bytes, UTF-8).
pub const MAX_REQUIREMENT_LEN: usize = 64;

/// Maximum number of declared dependencies.
pub const MAX_DEPENDENCIES: usize = 16;

/// Symbol name of the descriptor entry point.
pub const GET_MODULE_INFO_SYMBOL: &str = "getModuleInfo";

/// Symbol name of the initialization entry point.
pub const INITIALIZE_MODULE_SYMBOL: &str = "initializeModule";

/// Symbol name of the shutdown entry point.
pub const SHUTDOWN_MODULE_SYMBOL: &str = "shutdownModule";

/// Status returned by `initializeModule`/`shutdownModule` on success.
pub const STATUS_OK: i32 = 0;

/// Status returned when the module reported an error.
pub const STATUS_FAILED: i32 = 1;

/// Status returned when the module panicked inside an entry point.
pub const STATUS_PANICKED: i32 = 2;

/// Fills `out` with the module descriptor.
pub type GetModuleInfoFn = unsafe extern "C" fn(out: *mut RawModuleDescriptor);

/// One-time module setup. Returns [`STATUS_OK`] on success.
pub type InitializeModuleFn = unsafe extern "C" fn() -> i32;

/// Releases module resources. Returns [`STATUS_OK`] on success.
pub type ShutdownModuleFn = unsafe extern "C" fn() -> i32;

/// The three entry points of a module, resolved by symbol name.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModuleEntryPoints {
    pub get_info: GetModuleInfoFn,
    pub initialize: InitializeModuleFn,
    pub shutdown: ShutdownModuleFn,
}

/// Kind of module.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Plugin = 0,
    Extension = 1,
    Driver = 2,
    Service = 3,
}

impl ModuleType {
    /// Decode the raw `module_type` field.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Plugin),
            1 => Some(Self::Extension),
            2 => Some(Self::Driver),
            3 => Some(Self::Service),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Plugin => "plugin",
            ModuleType::Extension => "extension",
            ModuleType::Driver => "driver",
            ModuleType::Service => "service",
        }
    }
}

impl Display for ModuleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic version triple.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RawVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RawVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Display for RawVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Module descriptor copied by value across the library boundary.
///
/// Text fields are UTF-8, padded with NUL bytes. A field that uses its full
/// capacity has no terminator.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawModuleDescriptor {
    /// ABI version - must match [`MODULE_ABI_VERSION`]
    pub abi_version: u32,

    /// Unique module name
    pub name: [u8; MAX_NAME_LEN],

    /// Module version
    pub version: RawVersion,

    /// Human readable description
    pub description: [u8; MAX_DESCRIPTION_LEN],

    /// Author name
    pub author: [u8; MAX_NAME_LEN],

    /// [`ModuleType`] discriminant
    pub module_type: u32,

    /// Number of used slots in `dependencies`
    pub dependency_count: u32,

    /// Names of modules that must be initialized first
    pub dependencies: [[u8; MAX_NAME_LEN]; MAX_DEPENDENCIES],

    /// Semver requirement on the host version (empty = any host)
    pub host_requirement: [u8; MAX_REQUIREMENT_LEN],

    /// Non-zero once the module has completed `initializeModule`
    pub is_loaded: u8,
}

impl RawModuleDescriptor {
    /// An all-zero descriptor. Hosts pre-fill the output slot with this
    /// before calling `getModuleInfo`.
    pub const fn zeroed() -> Self {
        Self {
            abi_version: 0,
            name: [0; MAX_NAME_LEN],
            version: RawVersion::new(0, 0, 0),
            description: [0; MAX_DESCRIPTION_LEN],
            author: [0; MAX_NAME_LEN],
            module_type: 0,
            dependency_count: 0,
            dependencies: [[0; MAX_NAME_LEN]; MAX_DEPENDENCIES],
            host_requirement: [0; MAX_REQUIREMENT_LEN],
            is_loaded: 0,
        }
    }

    /// Create a descriptor with the required fields.
    ///
    /// # Panics
    /// Panics if `name` does not fit in [`MAX_NAME_LEN`] bytes.
    pub fn new(name: &str, version: RawVersion) -> Self {
        let mut desc = Self::zeroed();
        desc.abi_version = MODULE_ABI_VERSION;
        desc.version = version;
        assert!(
            write_fixed(&mut desc.name, name),
            "module name '{}' exceeds {} bytes",
            name,
            MAX_NAME_LEN
        );
        desc
    }

    /// Set the module type
    pub fn with_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = module_type as u32;
        self
    }

    /// Set the description, truncated to [`MAX_DESCRIPTION_LEN`] bytes.
    pub fn with_description(mut self, description: &str) -> Self {
        write_truncated(&mut self.description, description);
        self
    }

    /// Set the author, truncated to [`MAX_NAME_LEN`] bytes.
    pub fn with_author(mut self, author: &str) -> Self {
        write_truncated(&mut self.author, author);
        self
    }

    /// Declare a dependency on another module.
    ///
    /// # Panics
    /// Panics if more than [`MAX_DEPENDENCIES`] are declared or the name does
    /// not fit in [`MAX_NAME_LEN`] bytes.
    pub fn with_dependency(mut self, name: &str) -> Self {
        let slot = self.dependency_count as usize;
        assert!(
            slot < MAX_DEPENDENCIES,
            "a module may declare at most {} dependencies",
            MAX_DEPENDENCIES
        );
        assert!(
            write_fixed(&mut self.dependencies[slot], name),
            "dependency name '{}' exceeds {} bytes",
            name,
            MAX_NAME_LEN
        );
        self.dependency_count += 1;
        self
    }

    /// Require a host version, e.g. `">=1.2, <2"`.
    ///
    /// # Panics
    /// Panics if the requirement does not fit in [`MAX_REQUIREMENT_LEN`] bytes.
    pub fn with_host_requirement(mut self, requirement: &str) -> Self {
        assert!(
            write_fixed(&mut self.host_requirement, requirement),
            "host requirement '{}' exceeds {} bytes",
            requirement,
            MAX_REQUIREMENT_LEN
        );
        self
    }

    /// Set the loaded flag.
    pub fn with_loaded(mut self, loaded: bool) -> Self {
        self.is_loaded = loaded as u8;
        self
    }

    /// Declared dependency slots (raw bytes), clamped to the array capacity.
    pub fn dependency_slots(&self) -> &[[u8; MAX_NAME_LEN]] {
        let count = (self.dependency_count as usize).min(MAX_DEPENDENCIES);
        &self.dependencies[..count]
    }
}

impl Default for RawModuleDescriptor {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for RawModuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawModuleDescriptor")
            .field("abi_version", &self.abi_version)
            .field("name", &String::from_utf8_lossy(fixed_bytes(&self.name)))
            .field("version", &self.version)
            .field("module_type", &self.module_type)
            .field("dependency_count", &self.dependency_count)
            .field("is_loaded", &self.is_loaded)
            .finish_non_exhaustive()
    }
}

/// Bytes of a fixed field up to the first NUL.
pub fn fixed_bytes(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Decode a fixed field as UTF-8.
pub fn read_fixed(field: &[u8]) -> Result<&str, std::str::Utf8Error> {
    std::str::from_utf8(fixed_bytes(field))
}

/// Write `value` into a fixed field. Returns false (field untouched) if it
/// does not fit or contains a NUL byte.
pub fn write_fixed(field: &mut [u8], value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() > field.len() || bytes.contains(&0) {
        return false;
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    true
}

fn write_truncated(field: &mut [u8], value: &str) {
    let mut end = value.len().min(field.len());
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let value = &value[..end];
    let value = value.split('\0').next().unwrap_or_default();
    field.fill(0);
    field[..value.len()].copy_from_slice(value.as_bytes());
}
