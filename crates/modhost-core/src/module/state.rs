//! Module lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a module.
///
/// ```text
/// Discovered -> Loaded -> Initialized -> Running -> ShuttingDown -> Unloaded
/// ```
///
/// `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Path known, library not yet opened
    Discovered,
    /// Library opened and entry points resolved
    Loaded,
    /// Descriptor validated and dependencies satisfied
    Initialized,
    /// `initializeModule` succeeded; accepting calls
    Running,
    /// Draining in-flight calls before shutdown
    ShuttingDown,
    /// Handle closed
    Unloaded,
    /// Load aborted
    Failed,
}

impl ModuleState {
    /// Whether moving from `self` to `next` is a legal edge.
    pub fn can_transition_to(&self, next: ModuleState) -> bool {
        use ModuleState::*;
        match (self, next) {
            (Discovered, Loaded)
            | (Loaded, Initialized)
            | (Initialized, Running)
            | (Running, ShuttingDown)
            | (ShuttingDown, Unloaded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Unloaded | ModuleState::Failed)
    }

    /// At least initialized: a dependency in this state can be depended on.
    pub fn is_initialized(&self) -> bool {
        matches!(self, ModuleState::Initialized | ModuleState::Running)
    }

    pub fn accepts_calls(&self) -> bool {
        matches!(self, ModuleState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Discovered => "discovered",
            ModuleState::Loaded => "loaded",
            ModuleState::Initialized => "initialized",
            ModuleState::Running => "running",
            ModuleState::ShuttingDown => "shutting_down",
            ModuleState::Unloaded => "unloaded",
            ModuleState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
