//! Error taxonomy of the module host.
//!
//! Each host operation has its own error enum so callers can match on the
//! exact failure. [`Error`] unifies them for code that does not care.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::module::descriptor::DescriptorError;
use crate::module::state::ModuleState;

/// Why a descriptor failed the ABI compatibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiMismatch {
    /// Descriptor carries a different ABI version.
    AbiVersion { expected: u32, found: u32 },
    /// Host version is outside the module's requirement.
    HostVersion { required: String, host: String },
}

impl std::fmt::Display for AbiMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbiMismatch::AbiVersion { expected, found } => {
                write!(f, "ABI version {} (host expects {})", found, expected)
            }
            AbiMismatch::HostVersion { required, host } => {
                write!(f, "requires host {} (host is {})", required, host)
            }
        }
    }
}

/// Errors from `load_module`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Module file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Invalid module file {}: {reason}", path.display())]
    InvalidModuleFile { path: PathBuf, reason: String },

    #[error("Failed to open library {}: {reason}", path.display())]
    LibraryOpen { path: PathBuf, reason: String },

    #[error("Symbol '{symbol}' not found in {}: {reason}", path.display())]
    SymbolResolutionFailure {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    #[error("Invalid descriptor in {}: {source}", path.display())]
    InvalidDescriptor {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },

    #[error("ABI mismatch in {}: {detail}", path.display())]
    AbiVersionMismatch { path: PathBuf, detail: AbiMismatch },

    #[error("Module already loaded: {name}")]
    DuplicateModule { name: String },

    #[error("Dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("Module {module} has unresolved dependencies: {}", missing.join(", "))]
    UnresolvedDependency { module: String, missing: Vec<String> },

    #[error("Module {module} failed to initialize (status {code})")]
    InitializationFailure { module: String, code: i32 },
}

/// Errors from `unload_module`.
#[derive(Debug, Error)]
pub enum UnloadError {
    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error("Module {name} is required by: {}", dependents.join(", "))]
    UnresolvedDependents { name: String, dependents: Vec<String> },

    #[error("Timed out after {timeout:?} waiting for {active_calls} active call(s) on {name}")]
    UnloadTimeout {
        name: String,
        active_calls: usize,
        timeout: Duration,
    },
}

/// Errors from acquiring or using a module for a call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error("Module {name} is not accepting calls (state: {state})")]
    ModuleUnloading { name: String, state: ModuleState },

    #[error("Symbol '{symbol}' not found in module {module}")]
    SymbolResolutionFailure { module: String, symbol: String },
}

/// Returned by `get_module_info` for an unknown name.
#[derive(Debug, Clone, Error)]
#[error("Module not found: {name}")]
pub struct NotFoundError {
    pub name: String,
}

/// Errors from reloading a module.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("Reload failed while unloading: {0}")]
    Unload(#[from] UnloadError),

    #[error("Reload failed while loading: {0}")]
    Load(#[from] LoadError),

    /// `reload_all` unloaded everything but some modules did not come back.
    #[error("{} module(s) failed to reload: {}", failures.len(), summarize_loads(failures))]
    Incomplete {
        loaded: Vec<String>,
        failures: Vec<(PathBuf, LoadError)>,
    },
}

fn summarize_loads(failures: &[(PathBuf, LoadError)]) -> String {
    failures
        .iter()
        .map(|(path, err)| format!("{} ({})", path.display(), err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregated failures from `shutdown_all`.
#[derive(Debug, Error)]
#[error("{} module(s) failed to shut down: {}", failures.len(), summarize(failures))]
pub struct ShutdownError {
    pub failures: Vec<(String, UnloadError)>,
}

fn summarize(failures: &[(String, UnloadError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{} ({})", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Host configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Unified error type for the module host.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Unload(#[from] UnloadError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Reload(#[from] ReloadError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using the unified error.
pub type Result<T> = std::result::Result<T, Error>;

impl LoadError {
    /// True when retrying later (after other modules load) could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::UnresolvedDependency { .. })
    }
}
