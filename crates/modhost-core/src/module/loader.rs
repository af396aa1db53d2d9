//! Load and unload pipelines.
//!
//! The loader assumes the caller holds the registry's writer lock; the host
//! facade takes it once per public operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use modhost_sdk::abi::{RawModuleDescriptor, STATUS_OK};
use modhost_sdk::error::describe_status;
use modhost_sdk::ModuleEntryPoints;
use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use semver::Version;
use tracing::{debug, info, warn};

use super::abi::{check_abi_version, check_host_version};
use super::dependency::{find_cycle, missing_dependencies};
use super::descriptor::ModuleDescriptor;
use super::lifecycle::Lifecycle;
use super::registry::{LoadedModule, ModuleRegistry};
use super::source::{LibraryHandle, ModuleSource};
use super::state::ModuleState;
use crate::error::{LoadError, UnloadError};

/// A module rejected for unresolved dependencies. Kept only so a later load
/// can detect cycles through it; owns no handle.
#[derive(Debug, Clone)]
struct PendingModule {
    path: PathBuf,
    dependencies: Vec<String>,
}

/// Opens, validates, initializes and registers modules, and reverses it.
pub struct ModuleLoader {
    source: Arc<dyn ModuleSource>,
    registry: ModuleRegistry,
    pending: Mutex<HashMap<String, PendingModule>>,
    host_version: Version,
    unload_timeout: Duration,
}

impl ModuleLoader {
    pub fn new(source: Arc<dyn ModuleSource>, host_version: Version, unload_timeout: Duration) -> Self {
        Self {
            source,
            registry: ModuleRegistry::new(),
            pending: Mutex::new(HashMap::new()),
            host_version,
            unload_timeout,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn source(&self) -> &Arc<dyn ModuleSource> {
        &self.source
    }

    pub fn host_version(&self) -> &Version {
        &self.host_version
    }

    pub fn unload_timeout(&self) -> Duration {
        self.unload_timeout
    }

    /// Names of modules waiting on dependencies.
    pub fn pending_modules(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pending.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Read and validate a module's descriptor without initializing it.
    pub fn inspect(&self, path: &Path) -> Result<ModuleDescriptor, LoadError> {
        let opened = self.source.open(path)?;
        let handle = scopeguard::guard(opened.handle, |handle| close_handle(handle, path));
        let descriptor = read_descriptor(&opened.entry_points, path)?;
        drop(handle);
        Ok(descriptor)
    }

    /// Load the module at `path`. Requires the writer lock.
    pub(crate) fn load_locked(&self, path: &Path) -> Result<Arc<LoadedModule>, LoadError> {
        let result = self.load_inner(path);
        match &result {
            Ok(_) => {}
            Err(LoadError::UnresolvedDependency { .. }) => {}
            Err(_) => self.forget_pending_path(path),
        }
        result
    }

    fn load_inner(&self, path: &Path) -> Result<Arc<LoadedModule>, LoadError> {
        let lifecycle = Lifecycle::new(ModuleState::Discovered);
        let failed = scopeguard::guard(&lifecycle, |lifecycle| {
            let _ = lifecycle.transition(ModuleState::Failed);
            debug!(path = %path.display(), "Module load failed");
        });

        let opened = self.source.open(path)?;
        let entry_points = opened.entry_points;
        let handle = scopeguard::guard(opened.handle, |handle| close_handle(handle, path));
        advance(&lifecycle, ModuleState::Loaded, path);

        let mut descriptor = read_descriptor(&entry_points, path)?;
        check_host_version(&descriptor, &self.host_version).map_err(|detail| {
            LoadError::AbiVersionMismatch {
                path: path.to_path_buf(),
                detail,
            }
        })?;

        if self.registry.contains(&descriptor.name) {
            return Err(LoadError::DuplicateModule {
                name: descriptor.name,
            });
        }

        self.check_dependencies(&descriptor, path)?;
        advance(&lifecycle, ModuleState::Initialized, path);

        // SAFETY: entry points come from the open handle and follow the module ABI
        let status = unsafe { (entry_points.initialize)() };
        if status != STATUS_OK {
            warn!(
                module = %descriptor.name,
                status,
                meaning = describe_status(status),
                "Module initialization failed"
            );
            // SAFETY: as above; best effort cleanup of a partial initialization
            let shutdown_status = unsafe { (entry_points.shutdown)() };
            if shutdown_status != STATUS_OK {
                debug!(module = %descriptor.name, status = shutdown_status, "Cleanup shutdown reported an error");
            }
            return Err(LoadError::InitializationFailure {
                module: descriptor.name,
                code: status,
            });
        }

        // the module reports its own loaded flag
        let mut raw = RawModuleDescriptor::zeroed();
        // SAFETY: `raw` is a valid, writable descriptor
        unsafe { (entry_points.get_info)(&mut raw) };
        descriptor.is_loaded = raw.is_loaded != 0;

        advance(&lifecycle, ModuleState::Running, path);
        ScopeGuard::into_inner(failed);

        let module = Arc::new(LoadedModule::new(
            descriptor,
            path.to_path_buf(),
            entry_points,
            ScopeGuard::into_inner(handle),
            lifecycle,
        ));
        self.registry.insert(module.clone())?;
        self.pending.lock().remove(module.name());

        info!(
            module = %module.name(),
            version = %module.descriptor().version,
            path = %path.display(),
            "Module loaded"
        );
        Ok(module)
    }

    fn check_dependencies(&self, descriptor: &ModuleDescriptor, path: &Path) -> Result<(), LoadError> {
        let mut pending = self.pending.lock();

        let mut edges = self.registry.dependency_edges();
        for (name, record) in pending.iter() {
            edges
                .entry(name.clone())
                .or_insert_with(|| record.dependencies.clone());
        }

        if let Some(cycle) = find_cycle(&descriptor.name, &descriptor.dependencies, &edges) {
            pending.remove(&descriptor.name);
            return Err(LoadError::DependencyCycle { cycle });
        }

        let missing = missing_dependencies(&descriptor.dependencies, |dep| self.registry.state_of(dep));
        if !missing.is_empty() {
            debug!(
                module = %descriptor.name,
                missing = ?missing,
                "Module waiting on dependencies"
            );
            pending.insert(
                descriptor.name.clone(),
                PendingModule {
                    path: path.to_path_buf(),
                    dependencies: descriptor.dependencies.clone(),
                },
            );
            return Err(LoadError::UnresolvedDependency {
                module: descriptor.name.clone(),
                missing,
            });
        }

        pending.remove(&descriptor.name);
        Ok(())
    }

    fn forget_pending_path(&self, path: &Path) {
        self.pending.lock().retain(|_, record| record.path != path);
    }

    /// Unload `name`. Requires the writer lock.
    pub(crate) fn unload_locked(&self, name: &str) -> Result<(), UnloadError> {
        let module = self
            .registry
            .get(name)
            .ok_or_else(|| UnloadError::ModuleNotFound {
                name: name.to_string(),
            })?;

        let dependents = self.registry.dependents_of(name);
        if !dependents.is_empty() {
            return Err(UnloadError::UnresolvedDependents {
                name: name.to_string(),
                dependents,
            });
        }

        if let Err(state) = module.lifecycle().begin_shutdown() {
            // only Running/ShuttingDown modules are ever registered
            warn!(module = %name, state = %state, "Unexpected state at unload");
        }
        debug!(module = %name, state = %ModuleState::ShuttingDown, "Module state changed");

        if let Err(active_calls) = module.lifecycle().wait_idle(self.unload_timeout) {
            warn!(
                module = %name,
                active_calls,
                timeout_ms = self.unload_timeout.as_millis() as u64,
                "Unload timed out waiting for active calls"
            );
            return Err(UnloadError::UnloadTimeout {
                name: name.to_string(),
                active_calls,
                timeout: self.unload_timeout,
            });
        }

        // SAFETY: no calls are in flight and none can start; the handle is open
        let status = unsafe { (module.entry_points().shutdown)() };
        if status != STATUS_OK {
            warn!(
                module = %name,
                status,
                meaning = describe_status(status),
                "Module shutdown reported an error"
            );
        }

        if let Some(handle) = module.take_handle() {
            close_handle(handle, module.path());
        }

        self.registry.remove_with(name, |module| {
            if let Err(state) = module.lifecycle().transition(ModuleState::Unloaded) {
                warn!(module = %name, state = %state, "Unexpected state at removal");
            }
        });

        info!(module = %name, "Module unloaded");
        Ok(())
    }
}

fn advance(lifecycle: &Lifecycle, next: ModuleState, path: &Path) {
    match lifecycle.transition(next) {
        Ok(prev) => debug!(path = %path.display(), from = %prev, to = %next, "Module state changed"),
        Err(current) => warn!(path = %path.display(), from = %current, to = %next, "Illegal state transition"),
    }
}

/// Copy the descriptor out of the module and validate it.
fn read_descriptor(entry_points: &ModuleEntryPoints, path: &Path) -> Result<ModuleDescriptor, LoadError> {
    let mut raw = RawModuleDescriptor::zeroed();
    // SAFETY: `raw` is a valid, writable descriptor
    unsafe { (entry_points.get_info)(&mut raw) };

    check_abi_version(&raw).map_err(|detail| LoadError::AbiVersionMismatch {
        path: path.to_path_buf(),
        detail,
    })?;

    ModuleDescriptor::from_raw(&raw).map_err(|source| LoadError::InvalidDescriptor {
        path: path.to_path_buf(),
        source,
    })
}

fn close_handle(handle: LibraryHandle, path: &Path) {
    if let Err(e) = handle.close() {
        warn!(path = %path.display(), error = %e, "Failed to close module library");
    }
}
