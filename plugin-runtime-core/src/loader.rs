//! Plugin loader
//!
//! Discovers plugin packages below a plugins directory, validates their
//! manifest and hands the entry point to a [`ModuleLoader`]. Loaded modules
//! are registered with the [`ModuleRegistry`] under the manifest name.
//!
//! ```text
//! plugins/
//!   billing/
//!     manifest.json   {"name": "billing", "entryPoint": "libbilling.so"}
//!     libbilling.so
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::api::ApiModule;
use crate::error::{PluginResult, PluginRuntimeError};
use crate::registry::ModuleRegistry;

pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// Plugin manifest, read from the plugin's directory on every load attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    #[serde(default)]
    pub name: String,
    /// Entry point path relative to the plugin directory
    #[serde(default)]
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining manifest fields, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginManifest {
    /// Parse and validate a manifest
    ///
    /// # Errors
    ///
    /// [`PluginRuntimeError::InvalidManifest`] for malformed JSON or missing
    /// required fields.
    pub fn from_json(json: &str) -> PluginResult<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| PluginRuntimeError::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub async fn from_file(path: &Path) -> PluginResult<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            PluginRuntimeError::InvalidManifest(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> PluginResult<()> {
        if self.name.trim().is_empty() {
            return Err(PluginRuntimeError::InvalidManifest("missing 'name'".to_string()));
        }
        if self.entry_point.trim().is_empty() {
            return Err(PluginRuntimeError::InvalidManifest("missing 'entryPoint'".to_string()));
        }
        if Path::new(&self.entry_point).is_absolute() {
            return Err(PluginRuntimeError::InvalidManifest(
                "'entryPoint' must be relative to the plugin directory".to_string(),
            ));
        }
        Ok(())
    }
}

/// A module produced by a [`ModuleLoader`]
///
/// When the module comes from a shared library the library is carried along
/// and must outlive every reference to the module.
pub struct LoadedModule {
    // declared first: dropped before the library that holds its code
    pub module: Arc<dyn ApiModule>,
    library: Option<libloading::Library>,
}

impl LoadedModule {
    pub fn new(module: Arc<dyn ApiModule>) -> Self {
        Self { module, library: None }
    }

    pub fn with_library(module: Arc<dyn ApiModule>, library: libloading::Library) -> Self {
        Self {
            module,
            library: Some(library),
        }
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("module", &self.module.name())
            .field("native", &self.is_native())
            .finish()
    }
}

/// Turns a validated entry point into a module
#[cfg_attr(test, mockall::automock)]
pub trait ModuleLoader: Send + Sync {
    /// `entry_point` is canonical and inside the plugin directory
    fn load(&self, manifest: &PluginManifest, entry_point: &Path) -> PluginResult<LoadedModule>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginLoadFailure {
    pub plugin: String,
    pub reason: String,
}

/// Outcome of [`PluginLoader::load_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginLoadReport {
    /// Manifest names of plugins loaded by this pass
    pub loaded: Vec<String>,
    /// Plugin directories that failed to load
    pub failed: Vec<PluginLoadFailure>,
}

struct LoadedPlugin {
    directory: String,
    manifest: PluginManifest,
    loaded: LoadedModule,
}

/// Loads plugins from disk and registers them with a [`ModuleRegistry`]
///
/// Shared libraries are retained after [`PluginLoader::unload`] until the
/// loader itself is dropped, because routers that were already mounted may
/// still call into plugin code. The loader must therefore outlive any use of
/// the modules it produced.
pub struct PluginLoader {
    // registry first: its modules are dropped before the libraries below
    registry: Arc<ModuleRegistry>,
    loader: Arc<dyn ModuleLoader>,
    plugins_dir: PathBuf,
    manifest_file: String,
    loaded: Mutex<HashMap<String, LoadedPlugin>>,
    retired: Mutex<Vec<LoadedModule>>,
}

impl PluginLoader {
    pub fn new(
        plugins_dir: impl Into<PathBuf>,
        registry: Arc<ModuleRegistry>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self {
            registry,
            loader,
            plugins_dir: plugins_dir.into(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            loaded: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    pub fn with_manifest_file(mut self, file_name: impl Into<String>) -> Self {
        self.manifest_file = file_name.into();
        self
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Load every plugin directory, isolating failures per plugin
    ///
    /// # Errors
    ///
    /// Only when the plugins directory cannot be created or listed. An entry
    /// that cannot be inspected is reported as a failed plugin.
    pub async fn load_all(&self) -> PluginResult<PluginLoadReport> {
        if !tokio::fs::try_exists(&self.plugins_dir).await? {
            tokio::fs::create_dir_all(&self.plugins_dir).await?;
            info!(path = %self.plugins_dir.display(), "Created plugins directory");
        }

        let mut report = PluginLoadReport::default();
        let mut directories = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.plugins_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // follows symlinks, so a linked plugin directory counts
            match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) if metadata.is_dir() => directories.push(name),
                Ok(_) => {}
                Err(e) => {
                    error!(plugin = %name, error = %e, "Cannot inspect plugin directory entry");
                    report.failed.push(PluginLoadFailure {
                        plugin: name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        directories.sort();

        for directory in directories {
            match self.try_load(&directory).await {
                Ok(name) => report.loaded.push(name),
                Err(e) => {
                    error!(plugin = %directory, error = %e, "Failed to load plugin");
                    report.failed.push(PluginLoadFailure {
                        plugin: directory,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            total = self.loaded.lock().len(),
            "Plugin scan complete"
        );
        Ok(report)
    }

    /// Load the plugin in `directory`. Failures are logged, not raised.
    pub async fn load_one(&self, directory: &str) -> bool {
        match self.try_load(directory).await {
            Ok(_) => true,
            Err(e) => {
                error!(plugin = %directory, error = %e, "Failed to load plugin");
                false
            }
        }
    }

    /// Load the plugin in `directory` and return its manifest name
    ///
    /// # Errors
    ///
    /// Any manifest, path, loading or registration failure.
    pub async fn try_load(&self, directory: &str) -> PluginResult<String> {
        if directory.is_empty() || directory.contains(['/', '\\']) || directory == ".." {
            return Err(PluginRuntimeError::SecurityViolation(format!(
                "invalid plugin directory name {directory:?}"
            )));
        }

        let plugin_dir = self.plugins_dir.join(directory);
        if !tokio::fs::try_exists(&plugin_dir).await? {
            return Err(PluginRuntimeError::LoadingFailed(format!(
                "plugin directory {} not found",
                plugin_dir.display()
            )));
        }

        let manifest = PluginManifest::from_file(&plugin_dir.join(&self.manifest_file)).await?;
        if self.is_loaded(&manifest.name) {
            return Err(PluginRuntimeError::InvalidState(format!(
                "plugin '{}' is already loaded",
                manifest.name
            )));
        }

        let entry_point = self.resolve_entry_point(&plugin_dir, &manifest).await?;
        debug!(plugin = %directory, entry_point = %entry_point.display(), "Loading plugin");

        let loader = Arc::clone(&self.loader);
        let load_manifest = manifest.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&load_manifest, &entry_point))
            .await
            .map_err(|e| PluginRuntimeError::LoadingFailed(format!("loader aborted: {e}")))??;

        if loaded.module.name() != manifest.name {
            warn!(
                plugin = %directory,
                manifest_name = %manifest.name,
                module_name = %loaded.module.name(),
                "Module name differs from manifest, registering under manifest name"
            );
        }

        self.registry
            .register(manifest.name.clone(), Arc::clone(&loaded.module))
            .await?;

        let name = manifest.name.clone();
        info!(plugin = %name, version = ?manifest.version, "Plugin loaded");
        self.loaded.lock().insert(
            name.clone(),
            LoadedPlugin {
                directory: directory.to_string(),
                manifest,
                loaded,
            },
        );
        Ok(name)
    }

    /// Unregister a loaded plugin and clean it up. Returns `false` if it was not loaded.
    pub async fn unload(&self, name: &str) -> bool {
        let Some(plugin) = self.loaded.lock().remove(name) else {
            warn!(plugin = %name, "Plugin not loaded");
            return false;
        };

        // the name may have been taken over by another module since
        let owned = self
            .registry
            .get(name)
            .is_some_and(|m| same_module(&m, &plugin.loaded.module));
        if owned {
            let was_initialized = self
                .registry
                .state(name)
                .is_some_and(|s| s.is_initialized());
            self.registry.unregister(name).await;
            if was_initialized {
                if let Err(e) = plugin.loaded.module.cleanup().await {
                    warn!(plugin = %name, error = %e, "Plugin cleanup failed");
                }
            }
        }

        info!(plugin = %name, directory = %plugin.directory, "Plugin unloaded");
        self.retired.lock().push(plugin.loaded);
        true
    }

    /// Unload every plugin, then scan the plugins directory again
    pub async fn reload_all(&self) -> PluginResult<PluginLoadReport> {
        for name in self.loaded_plugins() {
            self.unload(&name).await;
        }
        self.load_all().await
    }

    /// Names of loaded plugins, sorted
    pub fn loaded_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains_key(name)
    }

    pub fn manifest(&self, name: &str) -> Option<PluginManifest> {
        self.loaded.lock().get(name).map(|p| p.manifest.clone())
    }

    async fn resolve_entry_point(&self, plugin_dir: &Path, manifest: &PluginManifest) -> PluginResult<PathBuf> {
        let candidate = plugin_dir.join(&manifest.entry_point);
        if !tokio::fs::try_exists(&candidate).await? {
            return Err(PluginRuntimeError::LoadingFailed(format!(
                "entry point {} not found",
                candidate.display()
            )));
        }

        let root = tokio::fs::canonicalize(plugin_dir).await?;
        let entry_point = tokio::fs::canonicalize(&candidate).await?;
        if !entry_point.starts_with(&root) {
            return Err(PluginRuntimeError::SecurityViolation(format!(
                "entry point {} escapes plugin directory",
                manifest.entry_point
            )));
        }
        Ok(entry_point)
    }
}

fn same_module(a: &Arc<dyn ApiModule>, b: &Arc<dyn ApiModule>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
