//! Declarative macros for module development.

/// Build a [`ModuleEntryPoints`](crate::abi::ModuleEntryPoints) table for a
/// type implementing [`Module`](crate::Module).
///
/// Each invocation gets its own loaded flag, so the same host process can
/// carry several compiled-in modules.
///
/// # Example
///
/// ```rust
/// use modhost_sdk::prelude::*;
///
/// struct Counter;
///
/// impl Module for Counter {
///     fn descriptor() -> RawModuleDescriptor {
///         RawModuleDescriptor::new("counter", RawVersion::new(0, 1, 0))
///     }
///
///     fn initialize() -> ModuleResult<()> {
///         Ok(())
///     }
/// }
///
/// let entry_points = module_entry_points!(Counter);
/// assert_eq!(unsafe { (entry_points.initialize)() }, STATUS_OK);
/// ```
#[macro_export]
macro_rules! module_entry_points {
    ($ty:ty) => {{
        static LOADED: ::std::sync::atomic::AtomicBool =
            ::std::sync::atomic::AtomicBool::new(false);

        unsafe extern "C" fn get_info(out: *mut $crate::abi::RawModuleDescriptor) {
            $crate::ffi::write_descriptor::<$ty>(out, &LOADED)
        }

        unsafe extern "C" fn initialize() -> i32 {
            $crate::ffi::run_initialize::<$ty>(&LOADED)
        }

        unsafe extern "C" fn shutdown() -> i32 {
            $crate::ffi::run_shutdown::<$ty>(&LOADED)
        }

        $crate::abi::ModuleEntryPoints {
            get_info,
            initialize,
            shutdown,
        }
    }};
}

/// Export the C-linkage entry points of a module library.
///
/// Generates `getModuleInfo`, `initializeModule` and `shutdownModule` with
/// `#[no_mangle]`. Use once per `cdylib`.
///
/// # Example
///
/// ```rust,ignore
/// use modhost_sdk::prelude::*;
///
/// struct MyModule;
///
/// impl Module for MyModule {
///     fn descriptor() -> RawModuleDescriptor {
///         RawModuleDescriptor::new("my-module", RawVersion::new(1, 0, 0))
///             .with_type(ModuleType::Plugin)
///     }
///
///     fn initialize() -> ModuleResult<()> {
///         Ok(())
///     }
/// }
///
/// export_module!(MyModule);
/// ```
#[macro_export]
macro_rules! export_module {
    ($ty:ty) => {
        static __MODHOST_LOADED: ::std::sync::atomic::AtomicBool =
            ::std::sync::atomic::AtomicBool::new(false);

        /// # Safety
        /// `out` must be null or valid for writing one descriptor.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn getModuleInfo(out: *mut $crate::abi::RawModuleDescriptor) {
            $crate::ffi::write_descriptor::<$ty>(out, &__MODHOST_LOADED)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn initializeModule() -> i32 {
            $crate::ffi::run_initialize::<$ty>(&__MODHOST_LOADED)
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn shutdownModule() -> i32 {
            $crate::ffi::run_shutdown::<$ty>(&__MODHOST_LOADED)
        }
    };
}
