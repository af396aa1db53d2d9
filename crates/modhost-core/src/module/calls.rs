//! Scoped access to a running module.

use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use super::descriptor::ModuleDescriptor;
use super::registry::LoadedModule;
use crate::error::CallError;

/// Guard for an in-flight call into a module.
///
/// While a `ModuleCall` exists the module's active-call count is held above
/// zero, so the module cannot be shut down and its library stays open. The
/// count is released on drop, including during unwinding.
#[derive(Debug)]
pub struct ModuleCall {
    module: Arc<LoadedModule>,
}

impl ModuleCall {
    pub(crate) fn enter(module: Arc<LoadedModule>) -> Result<Self, CallError> {
        module
            .lifecycle()
            .try_enter()
            .map_err(|state| CallError::ModuleUnloading {
                name: module.name().to_string(),
                state,
            })?;
        Ok(Self { module })
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        self.module.descriptor()
    }

    pub fn path(&self) -> &Path {
        self.module.path()
    }

    /// Look up an exported symbol and reinterpret its address as `T`.
    ///
    /// # Safety
    /// `T` must be the symbol's real type (normally an `extern "C" fn`), and
    /// the value must not be used after this guard is dropped.
    ///
    /// # Panics
    /// Panics if `T` is not pointer sized.
    pub unsafe fn symbol<T: Copy>(&self, name: &str) -> Result<ModuleSymbol<'_, T>, CallError> {
        assert_eq!(
            std::mem::size_of::<T>(),
            std::mem::size_of::<*const ()>(),
            "symbol type must be pointer sized"
        );
        let address = self
            .module
            .symbol(name)
            .ok_or_else(|| CallError::SymbolResolutionFailure {
                module: self.name().to_string(),
                symbol: name.to_string(),
            })?;
        let ptr = address.as_ptr();
        Ok(ModuleSymbol {
            // SAFETY: sizes checked above; type correctness is on the caller
            value: unsafe { std::mem::transmute_copy::<*const (), T>(&ptr) },
            _call: PhantomData,
        })
    }
}

impl Drop for ModuleCall {
    fn drop(&mut self) {
        self.module.lifecycle().exit();
    }
}

/// A symbol borrowed from a [`ModuleCall`].
pub struct ModuleSymbol<'a, T> {
    value: T,
    _call: PhantomData<&'a ModuleCall>,
}

impl<T> Deref for ModuleSymbol<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}
