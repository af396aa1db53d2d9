//! Module-side error types.

use thiserror::Error;

use crate::abi::{STATUS_FAILED, STATUS_OK, STATUS_PANICKED};

/// Error reported by a module from `initialize` or `shutdown`.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Shutdown failed
    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),

    /// Error with an explicit status code for the host
    #[error("Module error (status {code}): {message}")]
    Status { code: i32, message: String },
}

impl ModuleError {
    /// Status code returned across the ABI for this error.
    ///
    /// Never returns [`STATUS_OK`]; a custom code of 0 is mapped to
    /// [`STATUS_FAILED`].
    pub fn status_code(&self) -> i32 {
        match self {
            ModuleError::InitializationFailed(_) | ModuleError::ShutdownFailed(_) => STATUS_FAILED,
            ModuleError::Status { code, .. } if *code == STATUS_OK => STATUS_FAILED,
            ModuleError::Status { code, .. } => *code,
        }
    }
}

/// Module result type
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Human readable meaning of a status code returned by an entry point.
pub fn describe_status(code: i32) -> &'static str {
    match code {
        STATUS_OK => "ok",
        STATUS_FAILED => "failed",
        STATUS_PANICKED => "panicked",
        _ => "module-defined error",
    }
}
