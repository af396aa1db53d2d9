//! Host configuration.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! ```toml
//! unload_timeout_ms = 5000
//! host_version = "0.1.0"
//! module_dirs = ["/usr/lib/modhost/modules"]
//! allowed_paths = ["/usr/lib/modhost"]
//! max_file_size = 104857600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::module::security::{SecurityContext, DEFAULT_MAX_FILE_SIZE};

/// Default time an unload waits for in-flight calls.
pub const DEFAULT_UNLOAD_TIMEOUT_MS: u64 = 5000;

/// Environment variable names
pub mod env_vars {
    pub const UNLOAD_TIMEOUT_MS: &str = "MODHOST_UNLOAD_TIMEOUT_MS";
    /// Module directory, prepended to `module_dirs`
    pub const MODULE_DIR: &str = "MODHOST_MODULE_DIR";
    pub const HOST_VERSION: &str = "MODHOST_HOST_VERSION";
    /// Emit logs as JSON (read by the CLI)
    pub const LOG_JSON: &str = "MODHOST_LOG_JSON";
}

/// Module host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long `unload_module` waits for in-flight calls
    pub unload_timeout_ms: u64,

    /// Version checked against module host requirements.
    /// Defaults to this crate's version.
    pub host_version: Option<String>,

    /// Directories scanned for modules
    pub module_dirs: Vec<PathBuf>,

    /// Directories native modules may be loaded from (empty = anywhere)
    pub allowed_paths: Vec<PathBuf>,

    /// Maximum native module file size in bytes
    pub max_file_size: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            unload_timeout_ms: DEFAULT_UNLOAD_TIMEOUT_MS,
            host_version: None,
            module_dirs: Vec::new(),
            allowed_paths: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (environment variable name -> value).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env_vars::UNLOAD_TIMEOUT_MS) {
            self.unload_timeout_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: env_vars::UNLOAD_TIMEOUT_MS.to_string(),
                        value: value.clone(),
                        reason: e.to_string(),
                    })?;
        }
        if let Some(dir) = lookup(env_vars::MODULE_DIR) {
            let dir = PathBuf::from(dir);
            if !self.module_dirs.contains(&dir) {
                self.module_dirs.insert(0, dir);
            }
        }
        if let Some(version) = lookup(env_vars::HOST_VERSION) {
            self.host_version = Some(version.trim().to_string());
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_host_version()?;
        Ok(())
    }

    pub fn unload_timeout(&self) -> Duration {
        Duration::from_millis(self.unload_timeout_ms)
    }

    /// The configured host version, or this crate's version.
    pub fn resolved_host_version(&self) -> Result<Version, ConfigError> {
        let raw = self
            .host_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"));
        Version::parse(raw).map_err(|e| ConfigError::InvalidValue {
            key: "host_version".to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Path checks for native modules.
    pub fn security_context(&self) -> SecurityContext {
        let mut ctx = SecurityContext::new().with_max_file_size(self.max_file_size);
        for path in &self.allowed_paths {
            ctx.add_allowed_path(path);
        }
        ctx
    }

    pub fn with_unload_timeout(mut self, timeout: Duration) -> Self {
        self.unload_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = Some(version.into());
        self
    }

    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dirs.push(dir.into());
        self
    }

    pub fn with_allowed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.allowed_paths.push(path.into());
        self
    }
}
