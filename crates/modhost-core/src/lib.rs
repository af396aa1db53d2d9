//! Host side of the modhost dynamic module system.
//!
//! Loads native modules at runtime, validates their ABI, initializes them in
//! dependency order and unloads them once no call is in flight.
//!
//! ```no_run
//! use modhost_core::prelude::*;
//!
//! let host = ModuleHost::new(HostConfig::default())?;
//! let name = host.load_module("modules/libsample_module.so")?;
//! for module in host.list_modules() {
//!     println!("{}", module);
//! }
//! host.unload_module(&name)?;
//! # Ok::<(), modhost_core::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod module;

pub use config::{env_vars, HostConfig};
pub use error::{
    AbiMismatch, CallError, ConfigError, Error, LoadError, NotFoundError, ReloadError, Result,
    ShutdownError, UnloadError,
};
pub use event::ModuleEvent;
pub use host::{DirectoryLoadReport, ModuleHost, ModuleSummary};
pub use module::{
    DescriptorError, ModuleCall, ModuleDescriptor, ModuleRegistry, ModuleSource, ModuleState,
    ModuleSymbol, NativeModuleSource, SecurityContext, StaticModuleSource,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{env_vars, HostConfig};
    pub use crate::error::{CallError, Error, LoadError, Result, UnloadError};
    pub use crate::event::ModuleEvent;
    pub use crate::host::ModuleHost;
    pub use crate::module::{ModuleCall, ModuleDescriptor, ModuleState, StaticModuleSource};
    pub use modhost_sdk::ModuleType;
}
