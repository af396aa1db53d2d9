//! Module system internals: descriptors, sources, lifecycle and loading.

pub mod abi;
pub mod calls;
pub mod dependency;
pub mod descriptor;
pub mod lifecycle;
pub mod loader;
pub mod native;
pub mod registry;
pub mod security;
pub mod source;
pub mod state;

pub use calls::{ModuleCall, ModuleSymbol};
pub use descriptor::{DescriptorError, ModuleDescriptor};
pub use loader::ModuleLoader;
pub use native::NativeModuleSource;
pub use registry::{LoadedModule, ModuleRegistry};
pub use security::SecurityContext;
pub use source::{LibraryHandle, ModuleSource, OpenedModule, StaticModuleSource};
pub use state::ModuleState;
