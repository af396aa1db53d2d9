//! ABI compatibility checks.

use modhost_sdk::abi::{RawModuleDescriptor, MODULE_ABI_VERSION};
use semver::Version;

use super::descriptor::ModuleDescriptor;
use crate::error::AbiMismatch;

/// Check the raw ABI version before anything else in the descriptor is
/// trusted.
pub fn check_abi_version(raw: &RawModuleDescriptor) -> Result<(), AbiMismatch> {
    if raw.abi_version != MODULE_ABI_VERSION {
        return Err(AbiMismatch::AbiVersion {
            expected: MODULE_ABI_VERSION,
            found: raw.abi_version,
        });
    }
    Ok(())
}

/// Check the module's host requirement against the running host version.
pub fn check_host_version(
    descriptor: &ModuleDescriptor,
    host_version: &Version,
) -> Result<(), AbiMismatch> {
    match &descriptor.host_requirement {
        Some(req) if !req.matches(host_version) => Err(AbiMismatch::HostVersion {
            required: req.to_string(),
            host: host_version.to_string(),
        }),
        _ => Ok(()),
    }
}
