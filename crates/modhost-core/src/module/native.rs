//! Native shared library source backed by `libloading`.

use std::path::Path;

use libloading::Library;
use modhost_sdk::abi::{
    GetModuleInfoFn, InitializeModuleFn, ShutdownModuleFn, GET_MODULE_INFO_SYMBOL,
    INITIALIZE_MODULE_SYMBOL, SHUTDOWN_MODULE_SYMBOL,
};
use modhost_sdk::ModuleEntryPoints;

use super::security::{has_library_extension, SecurityContext};
use super::source::{LibraryHandle, ModuleSource, OpenedModule};
use crate::error::LoadError;

/// Loads modules from `.so` / `.dylib` / `.dll` files.
#[derive(Debug, Clone, Default)]
pub struct NativeModuleSource {
    security: SecurityContext,
}

impl NativeModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_security(security: SecurityContext) -> Self {
        Self { security }
    }

    pub fn security(&self) -> &SecurityContext {
        &self.security
    }
}

impl ModuleSource for NativeModuleSource {
    fn open(&self, path: &Path) -> Result<OpenedModule, LoadError> {
        self.security.validate_path(path)?;

        // SAFETY: loading a library runs its initializers; the file passed the
        // security checks above
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::LibraryOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // On error `library` is dropped here, which closes it
        let entry_points = resolve_entry_points(&library, path)?;

        tracing::debug!(path = %path.display(), "Resolved module entry points");

        Ok(OpenedModule {
            entry_points,
            handle: LibraryHandle::Native(library),
        })
    }

    fn is_module_file(&self, path: &Path) -> bool {
        path.is_file() && has_library_extension(path)
    }
}

fn resolve_entry_points(library: &Library, path: &Path) -> Result<ModuleEntryPoints, LoadError> {
    let missing = |symbol: &str, e: libloading::Error| LoadError::SymbolResolutionFailure {
        path: path.to_path_buf(),
        symbol: symbol.to_string(),
        reason: e.to_string(),
    };

    // SAFETY: the symbol types are the module ABI; the copied function
    // pointers are only used while the library stays open
    unsafe {
        let get_info = *library
            .get::<GetModuleInfoFn>(GET_MODULE_INFO_SYMBOL.as_bytes())
            .map_err(|e| missing(GET_MODULE_INFO_SYMBOL, e))?;
        let initialize = *library
            .get::<InitializeModuleFn>(INITIALIZE_MODULE_SYMBOL.as_bytes())
            .map_err(|e| missing(INITIALIZE_MODULE_SYMBOL, e))?;
        let shutdown = *library
            .get::<ShutdownModuleFn>(SHUTDOWN_MODULE_SYMBOL.as_bytes())
            .map_err(|e| missing(SHUTDOWN_MODULE_SYMBOL, e))?;

        Ok(ModuleEntryPoints {
            get_info,
            initialize,
            shutdown,
        })
    }
}
