//! The module host facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::HostConfig;
use crate::error::{
    CallError, ConfigError, LoadError, NotFoundError, ReloadError, ShutdownError, UnloadError,
};
use crate::event::{EventCallback, ModuleEvent};
use crate::module::calls::ModuleCall;
use crate::module::descriptor::ModuleDescriptor;
use crate::module::loader::ModuleLoader;
use crate::module::native::NativeModuleSource;
use crate::module::registry::ModuleRegistry;
use crate::module::source::ModuleSource;
use crate::module::state::ModuleState;

/// Outcome of [`ModuleHost::load_directory`].
#[derive(Debug, Default)]
pub struct DirectoryLoadReport {
    /// Loaded modules as (name, path), in load order
    pub loaded: Vec<(String, PathBuf)>,
    /// Files that could not be loaded
    pub failed: Vec<(PathBuf, LoadError)>,
}

impl DirectoryLoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Summary row for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
    pub path: PathBuf,
    pub state: ModuleState,
    pub active_calls: usize,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Loads, tracks and unloads modules.
///
/// Each host is independent; there is no process-wide instance. Dropping a
/// host shuts down every module it still holds.
pub struct ModuleHost {
    config: HostConfig,
    loader: ModuleLoader,
    event_callback: Option<EventCallback>,
}

impl ModuleHost {
    /// Host loading native libraries with the configured path checks.
    pub fn new(config: HostConfig) -> Result<Self, ConfigError> {
        let source = Arc::new(NativeModuleSource::with_security(config.security_context()));
        Self::with_source(config, source)
    }

    /// Host loading modules from a custom source.
    pub fn with_source(config: HostConfig, source: Arc<dyn ModuleSource>) -> Result<Self, ConfigError> {
        let host_version = config.resolved_host_version()?;
        let loader = ModuleLoader::new(source, host_version, config.unload_timeout());
        Ok(Self {
            config,
            loader,
            event_callback: None,
        })
    }

    /// Set the event callback.
    ///
    /// Events are delivered after the operation that produced them has
    /// released the host's writer lock, so the callback may load or unload
    /// modules on the same host.
    pub fn with_event_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ModuleEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        self.loader.registry()
    }

    /// Load, validate and initialize the module at `path`.
    /// Returns the module name.
    pub fn load_module(&self, path: impl AsRef<Path>) -> Result<String, LoadError> {
        let path = path.as_ref();
        self.write(|events| self.load_locked(path, events))
    }

    /// Shut down and unload `name` once its in-flight calls finish.
    pub fn unload_module(&self, name: &str) -> Result<(), UnloadError> {
        self.write(|events| self.unload_locked(name, events))
    }

    /// Descriptors of all loaded modules, in load order.
    pub fn list_modules(&self) -> Vec<ModuleDescriptor> {
        self.registry().descriptors()
    }

    /// Listing with runtime details.
    pub fn module_summaries(&self) -> Vec<ModuleSummary> {
        self.registry()
            .modules()
            .into_iter()
            .map(|module| ModuleSummary {
                descriptor: module.descriptor().clone(),
                path: module.path().to_path_buf(),
                state: module.state(),
                active_calls: module.active_calls(),
                loaded_at: module.loaded_at(),
            })
            .collect()
    }

    pub fn get_module_info(&self, name: &str) -> Result<ModuleDescriptor, NotFoundError> {
        self.registry()
            .get(name)
            .map(|module| module.descriptor().clone())
            .ok_or_else(|| NotFoundError {
                name: name.to_string(),
            })
    }

    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.registry().contains(name)
    }

    /// Names of loaded modules, in load order.
    pub fn loaded_module_names(&self) -> Vec<String> {
        self.registry().names()
    }

    pub fn module_state(&self, name: &str) -> Option<ModuleState> {
        self.registry().state_of(name)
    }

    /// In-flight calls of `name`, if loaded.
    pub fn active_calls(&self, name: &str) -> Option<usize> {
        self.registry().get(name).map(|m| m.active_calls())
    }

    /// Modules rejected for unresolved dependencies and not loaded since.
    pub fn pending_modules(&self) -> Vec<String> {
        self.loader.pending_modules()
    }

    /// Enter a call on a running module.
    pub fn acquire(&self, name: &str) -> Result<ModuleCall, CallError> {
        let module = self
            .registry()
            .get(name)
            .ok_or_else(|| CallError::ModuleNotFound {
                name: name.to_string(),
            })?;
        ModuleCall::enter(module)
    }

    /// Run `f` inside a call on `name`.
    pub fn with_module<R, F>(&self, name: &str, f: F) -> Result<R, CallError>
    where
        F: FnOnce(&ModuleCall) -> R,
    {
        let call = self.acquire(name)?;
        Ok(f(&call))
    }

    /// Read a module's descriptor without initializing or registering it.
    pub fn inspect_module(&self, path: impl AsRef<Path>) -> Result<ModuleDescriptor, LoadError> {
        self.loader.inspect(path.as_ref())
    }

    /// Unload `name` and load it again from the same path.
    pub fn reload_module(&self, name: &str) -> Result<String, ReloadError> {
        self.write(|events| -> Result<String, ReloadError> {
            let path = self
                .registry()
                .get(name)
                .map(|m| m.path().to_path_buf())
                .ok_or_else(|| UnloadError::ModuleNotFound {
                    name: name.to_string(),
                })?;
            self.unload_locked(name, events)?;
            Ok(self.load_locked(&path, events)?)
        })
    }

    /// Reload every module: unload in reverse load order, then load in the
    /// original order.
    ///
    /// If an unload fails, modules already unloaded are loaded back before
    /// the error is returned. Once everything is unloaded, every path is
    /// attempted even if earlier ones fail; the failures come back together
    /// in [`ReloadError::Incomplete`].
    pub fn reload_all(&self) -> Result<Vec<String>, ReloadError> {
        self.write(|events| -> Result<Vec<String>, ReloadError> {
            let modules: Vec<(String, PathBuf)> = self
                .registry()
                .modules()
                .iter()
                .map(|m| (m.name().to_string(), m.path().to_path_buf()))
                .collect();

            let mut unloaded: Vec<PathBuf> = Vec::new();
            for (name, path) in modules.iter().rev() {
                if let Err(e) = self.unload_locked(name, events) {
                    for path in unloaded.iter().rev() {
                        if let Err(err) = self.load_locked(path, events) {
                            warn!(path = %path.display(), error = %err, "Failed to restore module after aborted reload");
                        }
                    }
                    return Err(e.into());
                }
                unloaded.push(path.clone());
            }

            let mut loaded = Vec::with_capacity(modules.len());
            let mut failures = Vec::new();
            for (_, path) in &modules {
                match self.load_locked(path, events) {
                    Ok(name) => loaded.push(name),
                    Err(e) => failures.push((path.clone(), e)),
                }
            }

            if failures.is_empty() {
                Ok(loaded)
            } else {
                Err(ReloadError::Incomplete { loaded, failures })
            }
        })
    }

    /// Load every module file found in `dir`.
    ///
    /// Files rejected for unresolved dependencies are retried after each
    /// round that loads something, so modules come up in dependency order
    /// regardless of file names.
    pub fn load_directory(&self, dir: impl AsRef<Path>) -> Result<DirectoryLoadReport, LoadError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LoadError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }

        let entries = std::fs::read_dir(dir).map_err(|e| LoadError::InvalidModuleFile {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| self.loader.source().is_module_file(path))
            .collect();
        candidates.sort();

        info!(dir = %dir.display(), count = candidates.len(), "Loading module directory");

        let mut report = DirectoryLoadReport::default();
        loop {
            let mut retry = Vec::new();
            let mut progressed = false;

            for path in candidates {
                match self.load_module(&path) {
                    Ok(name) => {
                        report.loaded.push((name, path));
                        progressed = true;
                    }
                    Err(e) if e.is_retryable() => retry.push((path, e)),
                    Err(e) => report.failed.push((path, e)),
                }
            }

            if retry.is_empty() {
                break;
            }
            if !progressed {
                report.failed.extend(retry);
                break;
            }
            candidates = retry.into_iter().map(|(path, _)| path).collect();
        }

        Ok(report)
    }

    /// Load every module in the configured module directories.
    pub fn load_configured_dirs(&self) -> Vec<(PathBuf, Result<DirectoryLoadReport, LoadError>)> {
        self.config
            .module_dirs
            .clone()
            .into_iter()
            .map(|dir| {
                let report = self.load_directory(&dir);
                (dir, report)
            })
            .collect()
    }

    /// Unload every module in reverse load order.
    ///
    /// Continues past failures and reports all of them; a module that times
    /// out stays registered in `ShuttingDown`.
    pub fn shutdown_all(&self) -> Result<(), ShutdownError> {
        self.write(|events| {
            let names = self.registry().names();
            info!(count = names.len(), "Shutting down all modules");

            let mut failures = Vec::new();
            for name in names.iter().rev() {
                if let Err(e) = self.unload_locked(name, events) {
                    if let UnloadError::UnloadTimeout { active_calls, .. } = &e {
                        warn!(module = %name, active_calls, "Skipping module still in use");
                    }
                    failures.push((name.clone(), e));
                }
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(ShutdownError { failures })
            }
        })
    }

    /// Run `op` under the writer lock, then deliver the events it queued.
    fn write<T>(&self, op: impl FnOnce(&mut Vec<ModuleEvent>) -> T) -> T {
        let mut events = Vec::new();
        let result = {
            let _writer = self.registry().lock_writer();
            op(&mut events)
        };
        if let Some(callback) = &self.event_callback {
            for event in events {
                callback(event);
            }
        }
        result
    }

    fn load_locked(&self, path: &Path, events: &mut Vec<ModuleEvent>) -> Result<String, LoadError> {
        match self.loader.load_locked(path) {
            Ok(module) => {
                let name = module.name().to_string();
                events.push(ModuleEvent::Loaded {
                    name: name.clone(),
                    path: path.to_path_buf(),
                });
                Ok(name)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load module");
                events.push(ModuleEvent::LoadFailed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn unload_locked(&self, name: &str, events: &mut Vec<ModuleEvent>) -> Result<(), UnloadError> {
        match self.loader.unload_locked(name) {
            Ok(()) => {
                events.push(ModuleEvent::Unloaded {
                    name: name.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                events.push(ModuleEvent::UnloadFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl Drop for ModuleHost {
    fn drop(&mut self) {
        if self.registry().is_empty() {
            return;
        }
        if let Err(e) = self.shutdown_all() {
            warn!(error = %e, "Modules left loaded at host drop");
        }
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("config", &self.config)
            .field("modules", &self.loaded_module_names())
            .finish_non_exhaustive()
    }
}
