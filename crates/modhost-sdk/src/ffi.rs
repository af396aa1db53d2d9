//! Entry point plumbing used by the export macros.
//!
//! Every function here catches panics so that unwinding never crosses the
//! `extern "C"` boundary.

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::abi::{RawModuleDescriptor, STATUS_OK, STATUS_PANICKED};
use crate::Module;

/// Fill `out` with the descriptor of `M`, stamping the current loaded flag.
///
/// If `M::descriptor` panics, `out` is left untouched.
///
/// # Safety
/// `out` must be null or valid for writing one `RawModuleDescriptor`.
pub unsafe fn write_descriptor<M: Module>(out: *mut RawModuleDescriptor, loaded: &AtomicBool) {
    if out.is_null() {
        return;
    }
    let Ok(mut desc) = panic::catch_unwind(M::descriptor) else {
        return;
    };
    desc.is_loaded = loaded.load(Ordering::Acquire) as u8;
    // SAFETY: caller guarantees `out` points to writable memory
    unsafe { out.write(desc) };
}

/// Run `M::initialize`, setting the loaded flag on success.
pub fn run_initialize<M: Module>(loaded: &AtomicBool) -> i32 {
    match panic::catch_unwind(M::initialize) {
        Ok(Ok(())) => {
            loaded.store(true, Ordering::Release);
            STATUS_OK
        }
        Ok(Err(e)) => e.status_code(),
        Err(_) => STATUS_PANICKED,
    }
}

/// Run `M::shutdown`. The loaded flag is cleared whatever the outcome.
pub fn run_shutdown<M: Module>(loaded: &AtomicBool) -> i32 {
    let status = match panic::catch_unwind(M::shutdown) {
        Ok(Ok(())) => STATUS_OK,
        Ok(Err(e)) => e.status_code(),
        Err(_) => STATUS_PANICKED,
    };
    loaded.store(false, Ordering::Release);
    status
}
