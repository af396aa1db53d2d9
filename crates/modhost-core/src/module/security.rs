//! Path validation for native module files.

use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Default maximum module file size (100 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Shared library extension of the current platform.
pub fn platform_extension() -> &'static str {
    std::env::consts::DLL_EXTENSION
}

/// Whether `path` carries the platform's shared library extension.
pub fn has_library_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(platform_extension()))
        .unwrap_or(false)
}

/// Rules a module file must satisfy before it is opened.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    /// Directories modules may be loaded from. Empty allows any directory.
    pub allowed_paths: Vec<PathBuf>,

    /// Maximum module file size (in bytes)
    pub max_file_size: u64,
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl SecurityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an allowed directory.
    pub fn add_allowed_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.allowed_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Set maximum module file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Validate a module file path.
    pub fn validate_path(&self, path: &Path) -> Result<(), LoadError> {
        let invalid = |reason: String| LoadError::InvalidModuleFile {
            path: path.to_path_buf(),
            reason,
        };

        if !path.exists() {
            return Err(LoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        if !path.is_file() {
            return Err(invalid("not a regular file".to_string()));
        }

        if !has_library_extension(path) {
            return Err(invalid(format!(
                "unsupported extension, expected .{}",
                platform_extension()
            )));
        }

        let metadata =
            std::fs::metadata(path).map_err(|e| invalid(format!("cannot read metadata: {}", e)))?;
        if metadata.len() > self.max_file_size {
            return Err(invalid(format!(
                "file too large: {} bytes (max: {})",
                metadata.len(),
                self.max_file_size
            )));
        }

        if !self.allowed_paths.is_empty() {
            let canonical = path
                .canonicalize()
                .map_err(|e| invalid(format!("cannot canonicalize: {}", e)))?;

            let is_allowed = self.allowed_paths.iter().any(|allowed| {
                allowed
                    .canonicalize()
                    .map(|dir| canonical.starts_with(dir))
                    .unwrap_or(false)
            });

            if !is_allowed {
                return Err(invalid("outside allowed directories".to_string()));
            }
        }

        Ok(())
    }
}
