//! Lifecycle events for monitoring collaborators.

use std::path::PathBuf;

/// Events emitted by the module host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    /// Module initialized and registered
    Loaded { name: String, path: PathBuf },
    /// Module shut down and removed
    Unloaded { name: String },
    /// Load attempt rejected
    LoadFailed { path: PathBuf, error: String },
    /// Unload attempt rejected
    UnloadFailed { name: String, error: String },
}

impl ModuleEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ModuleEvent::Loaded { .. } => "loaded",
            ModuleEvent::Unloaded { .. } => "unloaded",
            ModuleEvent::LoadFailed { .. } => "load_failed",
            ModuleEvent::UnloadFailed { .. } => "unload_failed",
        }
    }
}

/// Callback invoked for every [`ModuleEvent`].
pub type EventCallback = Box<dyn Fn(ModuleEvent) + Send + Sync>;
