//! modhost Module SDK
//!
//! Everything a native module needs to be loadable by a modhost host: the
//! fixed-layout descriptor, entry point signatures, the [`Module`] trait and
//! the [`export_module!`] macro that emits the C-linkage symbols.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use modhost_sdk::prelude::*;
//!
//! struct MyModule;
//!
//! impl Module for MyModule {
//!     fn descriptor() -> RawModuleDescriptor {
//!         RawModuleDescriptor::new("my-module", RawVersion::new(1, 0, 0))
//!             .with_description("My module")
//!             .with_dependency("logger")
//!     }
//!
//!     fn initialize() -> ModuleResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! export_module!(MyModule);
//! ```

pub mod abi;
pub mod error;
pub mod ffi;
#[macro_use]
pub mod macros;

pub use abi::{
    GetModuleInfoFn, InitializeModuleFn, ModuleEntryPoints, ModuleType, RawModuleDescriptor,
    RawVersion, ShutdownModuleFn, MODULE_ABI_VERSION,
};
pub use error::{ModuleError, ModuleResult};

/// A native module.
///
/// Modules are process-global inside their library, so the trait has no
/// receiver. State lives in statics owned by the module.
pub trait Module {
    /// Static description of the module. Called any number of times.
    fn descriptor() -> RawModuleDescriptor;

    /// One-time setup, called by the host after validation.
    fn initialize() -> ModuleResult<()>;

    /// Release resources. Called once, after the last in-flight call.
    fn shutdown() -> ModuleResult<()> {
        Ok(())
    }
}

/// Prelude module with common imports
pub mod prelude {
    pub use crate::abi::{
        ModuleEntryPoints, ModuleType, RawModuleDescriptor, RawVersion, MODULE_ABI_VERSION,
        STATUS_FAILED, STATUS_OK, STATUS_PANICKED,
    };
    pub use crate::error::{ModuleError, ModuleResult};
    pub use crate::Module;
    pub use crate::{export_module, module_entry_points};
}
