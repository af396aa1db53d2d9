//! Registry of loaded modules.
//!
//! The registry is the single owner of every library handle. Lookups take the
//! read lock; structural changes (insert, remove) take the write lock for the
//! duration of the change only. Mutating host operations are additionally
//! serialized by the writer mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use modhost_sdk::ModuleEntryPoints;
use parking_lot::{Mutex, MutexGuard, RwLock};

use super::descriptor::ModuleDescriptor;
use super::lifecycle::Lifecycle;
use super::source::{LibraryHandle, SymbolAddress};
use super::state::ModuleState;
use crate::error::LoadError;

/// A module that completed initialization.
#[derive(Debug)]
pub struct LoadedModule {
    descriptor: ModuleDescriptor,
    path: PathBuf,
    entry_points: ModuleEntryPoints,
    handle: Mutex<Option<LibraryHandle>>,
    loaded_at: DateTime<Utc>,
    lifecycle: Lifecycle,
}

impl LoadedModule {
    pub(crate) fn new(
        descriptor: ModuleDescriptor,
        path: PathBuf,
        entry_points: ModuleEntryPoints,
        handle: LibraryHandle,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            descriptor,
            path,
            entry_points,
            handle: Mutex::new(Some(handle)),
            loaded_at: Utc::now(),
            lifecycle,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn state(&self) -> ModuleState {
        self.lifecycle.state()
    }

    pub fn active_calls(&self) -> usize {
        self.lifecycle.active_calls()
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn entry_points(&self) -> &ModuleEntryPoints {
        &self.entry_points
    }

    /// Resolve an exported symbol while the handle is open.
    pub(crate) fn symbol(&self, name: &str) -> Option<SymbolAddress> {
        self.handle.lock().as_ref().and_then(|h| h.symbol(name))
    }

    pub(crate) fn take_handle(&self) -> Option<LibraryHandle> {
        self.handle.lock().take()
    }
}

#[derive(Debug, Default)]
struct RegistryTable {
    by_name: HashMap<String, Arc<LoadedModule>>,
    order: Vec<String>,
}

/// Name to module table, kept in load order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    table: RwLock<RegistryTable>,
    writer: Mutex<()>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a mutating operation.
    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock()
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedModule>> {
        self.table.read().by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Module names in load order.
    pub fn names(&self) -> Vec<String> {
        self.table.read().order.clone()
    }

    /// Modules in load order.
    pub fn modules(&self) -> Vec<Arc<LoadedModule>> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).cloned())
            .collect()
    }

    /// Descriptor snapshots in load order.
    pub fn descriptors(&self) -> Vec<ModuleDescriptor> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name))
            .map(|module| module.descriptor.clone())
            .collect()
    }

    /// Names of registered modules that declare a dependency on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter(|other| other.as_str() != name)
            .filter_map(|other| table.by_name.get(other))
            .filter(|module| module.descriptor.depends_on(name))
            .map(|module| module.name().to_string())
            .collect()
    }

    /// Dependency edges of every registered module.
    pub fn dependency_edges(&self) -> HashMap<String, Vec<String>> {
        self.table
            .read()
            .by_name
            .iter()
            .map(|(name, module)| (name.clone(), module.descriptor.dependencies.clone()))
            .collect()
    }

    /// State of a registered module.
    pub fn state_of(&self, name: &str) -> Option<ModuleState> {
        self.table.read().by_name.get(name).map(|m| m.state())
    }

    pub(crate) fn insert(&self, module: Arc<LoadedModule>) -> Result<(), LoadError> {
        let mut table = self.table.write();
        let name = module.name().to_string();
        if table.by_name.contains_key(&name) {
            return Err(LoadError::DuplicateModule { name });
        }
        table.order.push(name.clone());
        table.by_name.insert(name, module);
        Ok(())
    }

    /// Remove `name`, running `on_remove` under the write lock so readers
    /// observe removal and the final state flip together.
    pub(crate) fn remove_with<F>(&self, name: &str, on_remove: F) -> Option<Arc<LoadedModule>>
    where
        F: FnOnce(&LoadedModule),
    {
        let mut table = self.table.write();
        let module = table.by_name.remove(name)?;
        table.order.retain(|n| n != name);
        on_remove(&module);
        Some(module)
    }
}
