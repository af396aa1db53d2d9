//! Owned descriptor snapshot.
//!
//! The raw descriptor is copied out of the module by value and parsed here.
//! Nothing in a [`ModuleDescriptor`] points into module memory, so snapshots
//! stay valid after the module is unloaded.

use std::fmt::{self, Display, Formatter};

use modhost_sdk::abi::{read_fixed, RawModuleDescriptor, MAX_DEPENDENCIES};
use modhost_sdk::ModuleType;
use semver::{Version, VersionReq};
use serde::Serialize;
use thiserror::Error;

/// Descriptor parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Missing required field: {0}")]
    EmptyField(String),

    #[error("Invalid UTF-8 in field '{0}'")]
    InvalidUtf8(String),

    #[error("Unknown module type: {0}")]
    UnknownModuleType(u32),

    #[error("Too many dependencies: {count} (max {max})")]
    TooManyDependencies { count: u32, max: usize },

    #[error("Invalid host requirement '{requirement}': {reason}")]
    InvalidHostRequirement { requirement: String, reason: String },
}

/// Parsed module descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: Version,
    pub description: String,
    pub author: String,
    pub module_type: ModuleType,
    /// Declared dependencies, in declaration order without duplicates
    pub dependencies: Vec<String>,
    /// Required host version range, `None` for any host
    #[serde(serialize_with = "serialize_requirement")]
    pub host_requirement: Option<VersionReq>,
    pub is_loaded: bool,
}

fn serialize_requirement<S>(req: &Option<VersionReq>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match req {
        Some(req) => serializer.serialize_some(&req.to_string()),
        None => serializer.serialize_none(),
    }
}

impl ModuleDescriptor {
    /// Parse a raw descriptor. The ABI version is not checked here.
    pub fn from_raw(raw: &RawModuleDescriptor) -> Result<Self, DescriptorError> {
        let name = required_text(&raw.name, "name")?;
        let description = text(&raw.description, "description")?;
        let author = text(&raw.author, "author")?;

        let module_type = ModuleType::from_raw(raw.module_type)
            .ok_or(DescriptorError::UnknownModuleType(raw.module_type))?;

        if raw.dependency_count as usize > MAX_DEPENDENCIES {
            return Err(DescriptorError::TooManyDependencies {
                count: raw.dependency_count,
                max: MAX_DEPENDENCIES,
            });
        }

        let mut dependencies: Vec<String> = Vec::with_capacity(raw.dependency_count as usize);
        for (i, slot) in raw.dependency_slots().iter().enumerate() {
            let dep = required_text(slot, &format!("dependencies[{}]", i))?;
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        let requirement = text(&raw.host_requirement, "host_requirement")?;
        let host_requirement = if requirement.trim().is_empty() {
            None
        } else {
            Some(VersionReq::parse(&requirement).map_err(|e| {
                DescriptorError::InvalidHostRequirement {
                    requirement: requirement.clone(),
                    reason: e.to_string(),
                }
            })?)
        };

        Ok(Self {
            name,
            version: Version::new(
                raw.version.major as u64,
                raw.version.minor as u64,
                raw.version.patch as u64,
            ),
            description,
            author,
            module_type,
            dependencies,
            host_requirement,
            is_loaded: raw.is_loaded != 0,
        })
    }

    /// Whether `name` is a declared dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

impl Display for ModuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} ({})", self.name, self.version, self.module_type)?;
        if !self.dependencies.is_empty() {
            write!(f, " deps=[{}]", self.dependencies.join(", "))?;
        }
        Ok(())
    }
}

fn text(field: &[u8], name: &str) -> Result<String, DescriptorError> {
    read_fixed(field)
        .map(str::to_string)
        .map_err(|_| DescriptorError::InvalidUtf8(name.to_string()))
}

fn required_text(field: &[u8], name: &str) -> Result<String, DescriptorError> {
    let value = text(field, name)?;
    if value.trim().is_empty() {
        return Err(DescriptorError::EmptyField(name.to_string()));
    }
    Ok(value)
}
