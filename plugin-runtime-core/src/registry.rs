//! Module registry
//!
//! Holds named modules, initializes them in dependency order and composes
//! their routers into one API surface. Mounted paths are
//! `{base}/{version}/{module}` plus the legacy `{base}/{module}`.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::Router;
use events_bus::EventBus;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::api::ApiModule;
use crate::error::{PluginResult, PluginRuntimeError};
use crate::lifecycle::ModuleState;

pub const MODULE_REGISTERED: &str = "module.registered";
pub const MODULE_UNREGISTERED: &str = "module.unregistered";
pub const MODULE_INITIALIZED: &str = "module.initialized";
pub const MODULE_FAILED: &str = "module.failed";

const DEFAULT_API_VERSION: &str = "v1";

/// What `register` does when the name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    /// Replace the existing module and log a warning
    Replace,
}

struct ModuleDescriptor {
    module: Arc<dyn ApiModule>,
    enabled: bool,
    /// Registry-level entries, layered over the module's own metadata
    metadata_overrides: HashMap<String, Value>,
    state: ModuleState,
}

impl ModuleDescriptor {
    fn new(module: Arc<dyn ApiModule>) -> Self {
        Self {
            enabled: module.is_enabled(),
            metadata_overrides: HashMap::new(),
            module,
            state: ModuleState::Registered,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled && self.module.is_enabled()
    }

    fn metadata(&self) -> HashMap<String, Value> {
        let mut metadata = self.module.metadata();
        metadata.extend(
            self.metadata_overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        metadata
    }
}

#[derive(Default)]
struct RegistryInner {
    modules: HashMap<String, ModuleDescriptor>,
    /// Registration order, used for tie-breaks and mounting
    order: Vec<String>,
    /// Order of the last successful initialization pass
    initialized: Vec<String>,
}

impl RegistryInner {
    fn dependencies_of(&self, name: &str) -> &[String] {
        self.modules
            .get(name)
            .map(|d| d.module.dependencies())
            .unwrap_or_default()
    }
}

struct InitTarget {
    module: Arc<dyn ApiModule>,
    enabled: bool,
    state: ModuleState,
    blocked_by: Option<String>,
}

/// Snapshot of one registered module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub description: String,
    pub version: String,
    pub dependencies: Vec<String>,
    pub enabled: bool,
    pub state: ModuleState,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFailure {
    pub module: String,
    pub reason: String,
}

/// Outcome of [`ModuleRegistry::initialize_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitializationReport {
    pub initialized: Vec<String>,
    pub failed: Vec<ModuleFailure>,
    pub skipped: Vec<String>,
    pub disabled: Vec<String>,
}

/// Outcome of [`ModuleRegistry::cleanup_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub cleaned: Vec<String>,
    pub failed: Vec<ModuleFailure>,
}

/// Registry of API modules
pub struct ModuleRegistry {
    inner: RwLock<RegistryInner>,
    policy: DuplicatePolicy,
    api_version: String,
    events: Option<Arc<EventBus>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            policy: DuplicatePolicy::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Version segment that module names must not collide with
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Publish lifecycle events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Register `module` under its own name
    pub async fn register_module(&self, module: Arc<dyn ApiModule>) -> PluginResult<()> {
        let name = module.name().to_string();
        self.register(name, module).await
    }

    /// Register `module` under `name`
    ///
    /// # Errors
    ///
    /// Fails on an invalid name, or on a duplicate name under
    /// [`DuplicatePolicy::Reject`].
    pub async fn register(&self, name: impl Into<String>, module: Arc<dyn ApiModule>) -> PluginResult<()> {
        let name = name.into();
        self.validate_name(&name)?;

        let replaced = {
            let mut inner = self.inner.write();
            let exists = inner.modules.contains_key(&name);
            if exists && self.policy == DuplicatePolicy::Reject {
                return Err(PluginRuntimeError::ModuleAlreadyRegistered(name));
            }

            let old = inner.modules.insert(name.clone(), ModuleDescriptor::new(module));
            if old.is_some() {
                inner.initialized.retain(|n| n != &name);
            } else {
                inner.order.push(name.clone());
            }
            old
        };

        match replaced {
            Some(old) => {
                warn!(module = %name, "Module already registered, replacing");
                if old.state.is_initialized() {
                    if let Err(e) = old.module.cleanup().await {
                        warn!(module = %name, error = %e, "Cleanup of replaced module failed");
                    }
                }
            }
            None => info!(module = %name, "Module registered"),
        }

        self.publish(MODULE_REGISTERED, &name).await;
        Ok(())
    }

    /// Remove a module. Returns whether it was registered.
    ///
    /// Cleanup is the caller's responsibility; see [`ModuleRegistry::cleanup_all`].
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            let removed = inner.modules.remove(name).is_some();
            if removed {
                inner.order.retain(|n| n != name);
                inner.initialized.retain(|n| n != name);
            }
            removed
        };

        if removed {
            info!(module = %name, "Module unregistered");
            self.publish(MODULE_UNREGISTERED, name).await;
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ApiModule>> {
        self.inner.read().modules.get(name).map(|d| d.module.clone())
    }

    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.inner.read().modules.get(name).map(|d| d.state.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().modules.is_empty()
    }

    /// Module names in registration order
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Summaries in registration order
    pub fn list(&self) -> Vec<ModuleSummary> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.modules.get(name).map(|d| (name, d)))
            .map(|(name, d)| ModuleSummary {
                name: name.clone(),
                description: d.module.description().to_string(),
                version: d.module.version().to_string(),
                dependencies: d.module.dependencies().to_vec(),
                enabled: d.is_enabled(),
                state: d.state.clone(),
                metadata: d.metadata(),
            })
            .collect()
    }

    /// Disabled modules are never mounted. A disabled module that is
    /// already initialized is cleaned up on the next
    /// [`ModuleRegistry::initialize_all`].
    pub fn set_enabled(&self, name: &str, enabled: bool) -> PluginResult<()> {
        self.with_descriptor(name, |d| d.enabled = enabled)
    }

    /// Set a registry-level entry. It shadows the module's own entry with
    /// the same key; the module itself is not modified.
    pub fn set_metadata(&self, name: &str, key: impl Into<String>, value: Value) -> PluginResult<()> {
        let key = key.into();
        self.with_descriptor(name, |d| {
            d.metadata_overrides.insert(key, value);
        })
    }

    /// Registry-level entry for `key`, falling back to the module's own
    pub fn get_metadata(&self, name: &str, key: &str) -> Option<Value> {
        let inner = self.inner.read();
        let descriptor = inner.modules.get(name)?;
        descriptor
            .metadata_overrides
            .get(key)
            .cloned()
            .or_else(|| descriptor.module.metadata().remove(key))
    }

    /// Topological order over declared dependencies
    ///
    /// Among modules whose dependencies are satisfied, the earliest
    /// registered comes first.
    ///
    /// # Errors
    ///
    /// [`PluginRuntimeError::MissingDependency`] or
    /// [`PluginRuntimeError::DependencyCycle`].
    pub fn initialization_order(&self) -> PluginResult<Vec<String>> {
        let inner = self.inner.read();

        for name in &inner.order {
            let missing = inner
                .dependencies_of(name)
                .iter()
                .find(|dep| !inner.modules.contains_key(dep.as_str()));
            if let Some(missing) = missing {
                return Err(PluginRuntimeError::MissingDependency {
                    module: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut remaining = inner.order.clone();
        let mut placed: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(remaining.len());

        while let Some(idx) = remaining
            .iter()
            .position(|name| inner.dependencies_of(name).iter().all(|d| placed.contains(d)))
        {
            let name = remaining.remove(idx);
            placed.insert(name.clone());
            ordered.push(name);
        }

        if remaining.is_empty() {
            Ok(ordered)
        } else {
            Err(PluginRuntimeError::DependencyCycle(remaining))
        }
    }

    /// Initialize every registered module in dependency order
    ///
    /// A failing module is recorded and does not stop the pass; modules that
    /// depend on it are skipped. Modules already initialized are left alone
    /// unless they were disabled or lost a dependency since, in which case
    /// they are cleaned up first.
    ///
    /// # Errors
    ///
    /// Fails before touching any module when the dependency graph is invalid.
    pub async fn initialize_all(&self) -> PluginResult<InitializationReport> {
        let order = self.initialization_order()?;
        let mut report = InitializationReport::default();

        for name in order {
            let Some(InitTarget {
                module,
                enabled,
                state,
                blocked_by,
            }) = self.init_target(&name)
            else {
                // unregistered while the pass was running
                continue;
            };

            if !enabled {
                if state.is_initialized() {
                    self.tear_down(&name, &module).await;
                }
                debug!(module = %name, "Module disabled, not initializing");
                self.set_state(&name, ModuleState::Disabled);
                report.disabled.push(name);
                continue;
            }

            if let Some(dep) = blocked_by {
                if state.is_initialized() {
                    self.tear_down(&name, &module).await;
                }
                warn!(module = %name, dependency = %dep, "Dependency not initialized, skipping module");
                self.set_state(&name, ModuleState::Skipped(format!("dependency '{dep}' not initialized")));
                report.skipped.push(name);
                continue;
            }

            if state.is_initialized() {
                report.initialized.push(name);
                continue;
            }

            let outcome = match AssertUnwindSafe(module.initialize()).catch_unwind().await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err("initialization panicked".to_string()),
            };

            match outcome {
                Ok(()) => {
                    info!(module = %name, version = %module.version(), "Module initialized");
                    self.set_state(&name, ModuleState::Initialized);
                    self.inner.write().initialized.push(name.clone());
                    self.publish(MODULE_INITIALIZED, &name).await;
                    report.initialized.push(name);
                }
                Err(reason) => {
                    error!(module = %name, error = %reason, "Module initialization failed");
                    self.set_state(&name, ModuleState::Failed(reason.clone()));
                    self.publish(MODULE_FAILED, &name).await;
                    report.failed.push(ModuleFailure { module: name, reason });
                }
            }
        }

        info!(
            initialized = report.initialized.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            disabled = report.disabled.len(),
            "Module initialization complete"
        );
        Ok(report)
    }

    /// Compose the routers of initialized modules
    ///
    /// Each module is nested at `{base_path}/{version}/{name}` and again at
    /// `{base_path}/{name}`.
    pub fn mount_routes(&self, base_path: &str, version: &str) -> Router {
        let mut versioned = Router::new();
        let mut legacy = Router::new();

        {
            let inner = self.inner.read();
            for name in &inner.order {
                let Some(descriptor) = inner.modules.get(name) else {
                    continue;
                };
                if !descriptor.state.is_initialized() || !descriptor.is_enabled() {
                    continue;
                }
                let Some(router) = descriptor.module.router() else {
                    debug!(module = %name, "Module has no routes");
                    continue;
                };

                let path = format!("/{name}");
                versioned = versioned.nest(&path, router.clone());
                legacy = legacy.nest(&path, router);
                debug!(module = %name, "Mounted module routes");
            }
        }

        let base = base_path.trim_end_matches('/');
        let versioned_path = format!("{base}/{version}");
        let app = Router::new().nest(&versioned_path, versioned);
        if base.is_empty() {
            app.merge(legacy)
        } else {
            app.nest(base, legacy)
        }
    }

    /// Clean up initialized modules in reverse initialization order
    pub async fn cleanup_all(&self) -> CleanupReport {
        let targets: Vec<(String, Arc<dyn ApiModule>)> = {
            let mut inner = self.inner.write();
            let order = std::mem::take(&mut inner.initialized);
            order
                .into_iter()
                .rev()
                .filter_map(|name| {
                    let module = inner.modules.get(&name)?.module.clone();
                    Some((name, module))
                })
                .collect()
        };

        let mut report = CleanupReport::default();
        for (name, module) in targets {
            let outcome = match AssertUnwindSafe(module.cleanup()).catch_unwind().await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err("cleanup panicked".to_string()),
            };
            self.set_state(&name, ModuleState::Registered);

            match outcome {
                Ok(()) => {
                    debug!(module = %name, "Module cleaned up");
                    report.cleaned.push(name);
                }
                Err(reason) => {
                    error!(module = %name, error = %reason, "Module cleanup failed");
                    report.failed.push(ModuleFailure { module: name, reason });
                }
            }
        }
        report
    }

    /// Clean up a module that is leaving the initialized set
    async fn tear_down(&self, name: &str, module: &Arc<dyn ApiModule>) {
        self.inner.write().initialized.retain(|n| n != name);
        match AssertUnwindSafe(module.cleanup()).catch_unwind().await {
            Ok(Ok(())) => debug!(module = %name, "Module cleaned up"),
            Ok(Err(e)) => warn!(module = %name, error = %e, "Module cleanup failed"),
            Err(_) => warn!(module = %name, "Module cleanup panicked"),
        }
    }

    fn init_target(&self, name: &str) -> Option<InitTarget> {
        let inner = self.inner.read();
        let descriptor = inner.modules.get(name)?;
        let blocked_by = descriptor
            .module
            .dependencies()
            .iter()
            .find(|dep| {
                !inner
                    .modules
                    .get(dep.as_str())
                    .is_some_and(|d| d.state.is_initialized())
            })
            .cloned();

        Some(InitTarget {
            module: descriptor.module.clone(),
            enabled: descriptor.is_enabled(),
            state: descriptor.state.clone(),
            blocked_by,
        })
    }

    fn validate_name(&self, name: &str) -> PluginResult<()> {
        let invalid = |reason: &str| PluginRuntimeError::InvalidModuleName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '*' | ':' | '{' | '}'))
        {
            return Err(invalid("name must be a single path segment"));
        }
        if name == self.api_version {
            return Err(invalid("name collides with the API version segment"));
        }
        Ok(())
    }

    fn with_descriptor(&self, name: &str, f: impl FnOnce(&mut ModuleDescriptor)) -> PluginResult<()> {
        let mut inner = self.inner.write();
        let descriptor = inner
            .modules
            .get_mut(name)
            .ok_or_else(|| PluginRuntimeError::ModuleNotFound(name.to_string()))?;
        f(descriptor);
        Ok(())
    }

    fn set_state(&self, name: &str, state: ModuleState) {
        if let Some(d) = self.inner.write().modules.get_mut(name) {
            d.state = state;
        }
    }

    async fn publish(&self, event: &str, name: &str) {
        if let Some(bus) = &self.events {
            bus.emit(event, json!({ "module": name })).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{BaseModule, ModuleBehavior, ModuleConfig};
    use crate::testing::TestModule;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use events_bus::Listener;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    struct NoRoutes;

    #[async_trait::async_trait]
    impl ModuleBehavior for NoRoutes {
        async fn configure_routes(&self, router: Router, _config: &ModuleConfig) -> PluginResult<Router> {
            Ok(router)
        }
    }

    async fn get_body(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_register_get_unregister() {
        let registry = ModuleRegistry::new();
        let module = TestModule::new("a");
        registry.register("a", module.clone()).await.unwrap();

        let found = registry.get("a").unwrap();
        assert_eq!(found.name(), "a");
        assert_eq!(registry.state("a"), Some(ModuleState::Registered));

        assert!(registry.unregister("a").await);
        assert!(registry.get("a").is_none());
        assert!(!registry.unregister("a").await);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_by_default() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("a")).await.unwrap();

        let err = registry.register_module(TestModule::new("a")).await.unwrap_err();
        assert!(matches!(err, PluginRuntimeError::ModuleAlreadyRegistered(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_replaced_when_allowed() {
        let registry = ModuleRegistry::new().with_policy(DuplicatePolicy::Replace);
        let first = TestModule::new("a");
        registry.register_module(first.clone()).await.unwrap();
        registry.register_module(TestModule::new("b")).await.unwrap();
        registry.initialize_all().await.unwrap();

        let second = TestModule::new("a").with_version("2.0.0");
        registry.register_module(second).await.unwrap();

        assert_eq!(first.cleanups(), 1);
        assert_eq!(registry.get("a").unwrap().version(), "2.0.0");
        assert_eq!(registry.state("a"), Some(ModuleState::Registered));
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_invalid_names_rejected() {
        let registry = ModuleRegistry::new();
        for name in ["", "a/b", "has space", ":id", "{x}", "*", "v1"] {
            let err = registry.register(name, TestModule::new("x")).await.unwrap_err();
            assert!(
                matches!(err, PluginRuntimeError::InvalidModuleName { .. }),
                "{name:?} accepted"
            );
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_initialization_follows_dependencies() {
        let registry = ModuleRegistry::new();
        registry
            .register_module(TestModule::new("patients").with_dependencies(["auth"]))
            .await
            .unwrap();
        registry.register_module(TestModule::new("reports")).await.unwrap();
        registry.register_module(TestModule::new("auth")).await.unwrap();

        assert_eq!(
            registry.initialization_order().unwrap(),
            vec!["reports", "auth", "patients"]
        );

        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.initialized, vec!["reports", "auth", "patients"]);
    }

    #[tokio::test]
    async fn test_missing_dependency_fails_fast() {
        let registry = ModuleRegistry::new();
        let patients = TestModule::new("patients").with_dependencies(["auth"]);
        registry.register_module(patients.clone()).await.unwrap();

        let err = registry.initialize_all().await.unwrap_err();
        assert!(matches!(
            err,
            PluginRuntimeError::MissingDependency { ref module, ref dependency }
                if module == "patients" && dependency == "auth"
        ));
        assert_eq!(patients.initializations(), 0);
    }

    #[tokio::test]
    async fn test_cycle_fails_fast() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("free")).await.unwrap();
        registry
            .register_module(TestModule::new("a").with_dependencies(["b"]))
            .await
            .unwrap();
        registry
            .register_module(TestModule::new("b").with_dependencies(["a"]))
            .await
            .unwrap();

        let err = registry.initialize_all().await.unwrap_err();
        match err {
            PluginRuntimeError::DependencyCycle(members) => assert_eq!(members, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.state("free"), Some(ModuleState::Registered));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_dependents_skipped() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::failing("auth")).await.unwrap();
        registry
            .register_module(TestModule::new("patients").with_dependencies(["auth"]))
            .await
            .unwrap();
        registry.register_module(TestModule::new("reports")).await.unwrap();

        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.initialized, vec!["reports"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].module, "auth");
        assert_eq!(report.skipped, vec!["patients"]);
        assert!(matches!(registry.state("auth"), Some(ModuleState::Failed(_))));
        assert!(matches!(registry.state("patients"), Some(ModuleState::Skipped(_))));

        let app = registry.mount_routes("/api", "v1");
        assert_eq!(get_body(&app, "/api/v1/reports").await.0, StatusCode::OK);
        assert_eq!(get_body(&app, "/api/v1/auth").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_body(&app, "/api/patients").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panicking_module_is_isolated() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::panicking("boom")).await.unwrap();
        registry.register_module(TestModule::new("ok")).await.unwrap();

        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.initialized, vec!["ok"]);
        assert_eq!(report.failed[0].reason, "initialization panicked");
    }

    #[tokio::test]
    async fn test_disabled_module_not_initialized() {
        let registry = ModuleRegistry::new();
        let module = TestModule::new("a");
        registry.register_module(module.clone()).await.unwrap();
        registry.set_enabled("a", false).unwrap();

        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.disabled, vec!["a"]);
        assert_eq!(module.initializations(), 0);
        assert_eq!(registry.state("a"), Some(ModuleState::Disabled));
        assert!(registry.set_enabled("missing", true).is_err());
    }

    #[tokio::test]
    async fn test_disabling_initialized_module_unmounts_it() {
        let registry = ModuleRegistry::new();
        let module = TestModule::new("a");
        registry.register_module(module.clone()).await.unwrap();
        registry.initialize_all().await.unwrap();

        registry.set_enabled("a", false).unwrap();
        let app = registry.mount_routes("/api", "v1");
        assert_eq!(get_body(&app, "/api/v1/a").await.0, StatusCode::NOT_FOUND);

        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.disabled, vec!["a"]);
        assert_eq!(module.cleanups(), 1);
        assert_eq!(registry.state("a"), Some(ModuleState::Disabled));

        let app = registry.mount_routes("/api", "v1");
        assert_eq!(get_body(&app, "/api/v1/a").await.0, StatusCode::NOT_FOUND);
        assert!(registry.cleanup_all().await.cleaned.is_empty());

        registry.set_enabled("a", true).unwrap();
        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.initialized, vec!["a"]);
        assert_eq!(module.initializations(), 2);
        let app = registry.mount_routes("/api", "v1");
        assert_eq!(get_body(&app, "/api/v1/a").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabling_dependency_skips_initialized_dependent() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("auth")).await.unwrap();
        let patients = TestModule::new("patients").with_dependencies(["auth"]);
        registry.register_module(patients.clone()).await.unwrap();
        registry.initialize_all().await.unwrap();

        registry.set_enabled("auth", false).unwrap();
        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.disabled, vec!["auth"]);
        assert_eq!(report.skipped, vec!["patients"]);
        assert_eq!(patients.cleanups(), 1);
        assert!(matches!(registry.state("patients"), Some(ModuleState::Skipped(_))));
    }

    #[tokio::test]
    async fn test_initialize_all_is_idempotent() {
        let registry = ModuleRegistry::new();
        let module = TestModule::new("a");
        registry.register_module(module.clone()).await.unwrap();

        registry.initialize_all().await.unwrap();
        let report = registry.initialize_all().await.unwrap();
        assert_eq!(report.initialized, vec!["a"]);
        assert_eq!(module.initializations(), 1);
    }

    #[tokio::test]
    async fn test_mount_versioned_and_legacy_routes() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("auth")).await.unwrap();
        registry
            .register_module(TestModule::new("patients").with_dependencies(["auth"]))
            .await
            .unwrap();
        registry.initialize_all().await.unwrap();

        let app = registry.mount_routes("/api", "v1");
        for uri in ["/api/v1/auth", "/api/v1/patients", "/api/auth", "/api/patients"] {
            let (status, body) = get_body(&app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(uri.ends_with(&body), "{uri} served {body}");
        }
        assert_eq!(get_body(&app, "/api/v2/auth").await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mount_at_root_base() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("auth")).await.unwrap();
        registry.initialize_all().await.unwrap();

        let app = registry.mount_routes("/", "v1");
        assert_eq!(get_body(&app, "/v1/auth").await.0, StatusCode::OK);
        assert_eq!(get_body(&app, "/auth").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cleanup_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ModuleRegistry::new();
        registry
            .register_module(TestModule::new("auth").with_cleanup_log(log.clone()))
            .await
            .unwrap();
        registry
            .register_module(
                TestModule::new("patients")
                    .with_dependencies(["auth"])
                    .with_cleanup_log(log.clone()),
            )
            .await
            .unwrap();
        registry.initialize_all().await.unwrap();

        let report = registry.cleanup_all().await;
        assert_eq!(report.cleaned, vec!["patients", "auth"]);
        assert_eq!(*log.lock(), vec!["patients", "auth"]);
        assert_eq!(registry.state("auth"), Some(ModuleState::Registered));

        assert!(registry.cleanup_all().await.cleaned.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_and_list() {
        let registry = ModuleRegistry::new();
        registry.register_module(TestModule::new("b")).await.unwrap();
        registry.register_module(TestModule::new("a")).await.unwrap();
        registry.set_metadata("a", "owner", json!("intake")).unwrap();

        assert_eq!(registry.get_metadata("a", "owner"), Some(json!("intake")));
        assert_eq!(registry.get_metadata("b", "owner"), None);

        let names: Vec<_> = registry.list().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a"]);

        let summary = serde_json::to_value(&registry.list()[1]).unwrap();
        assert_eq!(summary["state"], "registered");
        assert_eq!(summary["metadata"]["owner"], "intake");
    }

    #[tokio::test]
    async fn test_metadata_reads_through_to_module() {
        let registry = ModuleRegistry::new();
        let module = Arc::new(BaseModule::new("intake", "1.0.0", NoRoutes));
        registry.register_module(module.clone()).await.unwrap();

        module.set_metadata("owner", json!("front-desk"));
        module.set_metadata("tier", json!(1));
        assert_eq!(registry.get_metadata("intake", "owner"), Some(json!("front-desk")));

        registry.set_metadata("intake", "owner", json!("triage")).unwrap();
        assert_eq!(registry.get_metadata("intake", "owner"), Some(json!("triage")));
        assert_eq!(module.get_metadata("owner"), Some(json!("front-desk")));

        let summary = &registry.list()[0];
        assert_eq!(summary.metadata["owner"], json!("triage"));
        assert_eq!(summary.metadata["tier"], json!(1));
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event in [MODULE_REGISTERED, MODULE_INITIALIZED, MODULE_FAILED, MODULE_UNREGISTERED] {
            let seen = seen.clone();
            let event_name = event.to_string();
            bus.on(
                event,
                &Listener::sync(move |payload| {
                    seen.lock().push(format!("{event_name}:{}", payload["module"]));
                    Ok(())
                }),
            );
        }

        let registry = ModuleRegistry::new().with_event_bus(bus);
        registry.register_module(TestModule::new("a")).await.unwrap();
        registry.register_module(TestModule::failing("b")).await.unwrap();
        registry.initialize_all().await.unwrap();
        registry.unregister("a").await;

        assert_eq!(
            *seen.lock(),
            vec![
                "module.registered:\"a\"",
                "module.registered:\"b\"",
                "module.initialized:\"a\"",
                "module.failed:\"b\"",
                "module.unregistered:\"a\"",
            ]
        );
    }
}
