//! Native shared-library plugins
//!
//! A plugin is a `cdylib` built against this crate that exports two symbols,
//! both generated by [`declare_plugin!`](crate::declare_plugin):
//!
//! - `_carehub_plugin_abi_version`: returns [`PLUGIN_ABI_VERSION`]
//! - `_carehub_plugin_create`: returns the boxed module
//!
//! # Security
//!
//! Loading a plugin runs arbitrary native code inside the host process with
//! the host's privileges. There is no sandbox. Only configure plugin
//! directories whose contents are as trusted as the host binary, and build
//! plugins with the same compiler and the same version of this crate, since
//! the module is passed across the boundary as a Rust trait object.

use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use crate::api::ApiModule;
use crate::error::{PluginResult, PluginRuntimeError};
use crate::loader::{LoadedModule, ModuleLoader, PluginManifest};

/// Bumped whenever [`ApiModule`] changes shape
pub const PLUGIN_ABI_VERSION: u32 = 1;

pub const ABI_VERSION_SYMBOL: &[u8] = b"_carehub_plugin_abi_version";
pub const CREATE_SYMBOL: &[u8] = b"_carehub_plugin_create";

type AbiVersionFn = unsafe extern "C" fn() -> u32;
type CreateFn = unsafe fn() -> Box<dyn ApiModule>;

/// [`ModuleLoader`] backed by `libloading`
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleLoader;

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for NativeModuleLoader {
    #[allow(unsafe_code)]
    fn load(&self, manifest: &PluginManifest, entry_point: &Path) -> PluginResult<LoadedModule> {
        // SAFETY: loading a library runs its initializers; the plugin
        // directory is trusted by configuration.
        let library = unsafe { Library::new(entry_point) }.map_err(|e| {
            PluginRuntimeError::LoadingFailed(format!("{}: {e}", entry_point.display()))
        })?;

        // SAFETY: symbol type matches the signature emitted by `declare_plugin!`.
        let abi_version: Symbol<AbiVersionFn> = unsafe { library.get(ABI_VERSION_SYMBOL) }.map_err(|e| {
            PluginRuntimeError::InvalidModule(format!("'{}' exports no ABI version: {e}", manifest.name))
        })?;
        // SAFETY: the function takes no arguments and only returns a constant.
        let version = unsafe { abi_version() };
        if version != PLUGIN_ABI_VERSION {
            return Err(PluginRuntimeError::InvalidModule(format!(
                "'{}' ABI version mismatch: plugin={version}, host={PLUGIN_ABI_VERSION}",
                manifest.name
            )));
        }

        // SAFETY: ABI version checked above; constructor signature is part of that contract.
        let create: Symbol<CreateFn> = unsafe { library.get(CREATE_SYMBOL) }.map_err(|e| {
            PluginRuntimeError::InvalidModule(format!("'{}' exports no constructor: {e}", manifest.name))
        })?;
        // SAFETY: the returned box is allocated by the plugin with the shared
        // global allocator and its vtable lives as long as `library`.
        let module: Arc<dyn ApiModule> = Arc::from(unsafe { create() });

        debug!(plugin = %manifest.name, module = %module.name(), version = %module.version(), "Native module created");
        Ok(LoadedModule::with_library(module, library))
    }
}

/// Export a module constructor from a plugin `cdylib`
///
/// ```ignore
/// use plugin_runtime_core::{declare_plugin, BaseModule};
///
/// fn create() -> BaseModule<Billing> {
///     BaseModule::new("billing", "0.1.0", Billing::default())
/// }
///
/// declare_plugin!(create);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($constructor:path) => {
        #[no_mangle]
        pub extern "C" fn _carehub_plugin_abi_version() -> u32 {
            $crate::PLUGIN_ABI_VERSION
        }

        #[no_mangle]
        pub fn _carehub_plugin_create() -> ::std::boxed::Box<dyn $crate::ApiModule> {
            ::std::boxed::Box::new($constructor())
        }
    };
}
