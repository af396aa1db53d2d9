//! Module sources.
//!
//! A [`ModuleSource`] turns a path into resolved entry points plus the handle
//! that keeps them valid. The loader does not care whether the code came from
//! a shared library on disk or was linked into the host binary.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;
use modhost_sdk::ModuleEntryPoints;
use parking_lot::RwLock;

use crate::error::LoadError;

/// Opens module files.
pub trait ModuleSource: Send + Sync {
    /// Open `path` and resolve the three entry points.
    fn open(&self, path: &Path) -> Result<OpenedModule, LoadError>;

    /// Whether a directory scan should try to load `path`.
    fn is_module_file(&self, path: &Path) -> bool;
}

/// An opened module: entry points and the handle that owns them.
pub struct OpenedModule {
    pub entry_points: ModuleEntryPoints,
    pub handle: LibraryHandle,
}

/// Address of an exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAddress(*const ());

// SAFETY: the address is only dereferenced through a `ModuleCall`, which keeps
// the owning handle open.
unsafe impl Send for SymbolAddress {}
unsafe impl Sync for SymbolAddress {}

impl SymbolAddress {
    pub fn new(ptr: *const ()) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(&self) -> *const () {
        self.0
    }
}

/// Owner of a module's code. Closing it invalidates every resolved symbol.
pub enum LibraryHandle {
    /// Shared library opened with `libloading`
    Native(Library),
    /// Module linked into the host binary
    Static {
        symbols: HashMap<String, SymbolAddress>,
    },
}

impl LibraryHandle {
    /// Look up an exported symbol by name.
    pub fn symbol(&self, name: &str) -> Option<SymbolAddress> {
        match self {
            LibraryHandle::Native(library) => {
                // SAFETY: only the address is read; the caller decides the type
                let symbol = unsafe { library.get::<*const ()>(name.as_bytes()) }.ok()?;
                Some(SymbolAddress(*symbol))
            }
            LibraryHandle::Static { symbols } => symbols.get(name).copied(),
        }
    }

    /// Release the library.
    pub fn close(self) -> Result<(), String> {
        match self {
            LibraryHandle::Native(library) => library.close().map_err(|e| e.to_string()),
            LibraryHandle::Static { .. } => Ok(()),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, LibraryHandle::Native(_))
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryHandle::Native(_) => f.write_str("LibraryHandle::Native"),
            LibraryHandle::Static { symbols } => f
                .debug_struct("LibraryHandle::Static")
                .field("symbols", &symbols.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

struct StaticEntry {
    entry_points: ModuleEntryPoints,
    symbols: HashMap<String, SymbolAddress>,
}

/// Source for modules compiled into the host binary.
///
/// Modules are registered under a path, which is what `load_module` receives.
/// The path does not need to exist on disk.
#[derive(Default)]
pub struct StaticModuleSource {
    modules: RwLock<HashMap<PathBuf, StaticEntry>>,
}

impl StaticModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `path`, replacing any previous registration.
    pub fn register(&self, path: impl Into<PathBuf>, entry_points: ModuleEntryPoints) {
        self.register_with_symbols(path, entry_points, &[]);
    }

    /// Register a module together with extra exported symbols.
    pub fn register_with_symbols(
        &self,
        path: impl Into<PathBuf>,
        entry_points: ModuleEntryPoints,
        symbols: &[(&str, *const ())],
    ) {
        let symbols = symbols
            .iter()
            .map(|(name, ptr)| (name.to_string(), SymbolAddress(*ptr)))
            .collect();
        self.modules.write().insert(
            path.into(),
            StaticEntry {
                entry_points,
                symbols,
            },
        );
    }

    pub fn unregister(&self, path: &Path) -> bool {
        self.modules.write().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }
}

impl ModuleSource for StaticModuleSource {
    fn open(&self, path: &Path) -> Result<OpenedModule, LoadError> {
        let modules = self.modules.read();
        let entry = modules.get(path).ok_or_else(|| LoadError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        Ok(OpenedModule {
            entry_points: entry.entry_points,
            handle: LibraryHandle::Static {
                symbols: entry.symbols.clone(),
            },
        })
    }

    fn is_module_file(&self, path: &Path) -> bool {
        self.modules.read().contains_key(path)
    }
}
