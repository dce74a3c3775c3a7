//! Base module
//!
//! [`BaseModule`] implements the [`ApiModule`] contract around a
//! [`ModuleBehavior`] that only has to build routes. Configuration, metadata
//! and the six lifecycle hooks are handled here.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::Router;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::ApiModule;
use crate::error::PluginResult;
use crate::lifecycle::ModuleHooks;

/// Per-module configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            options: Map::new(),
        }
    }
}

impl ModuleConfig {
    /// Overwrites `enabled` and merges `options` key by key
    pub fn merge(&mut self, update: ModuleConfig) {
        self.enabled = update.enabled;
        self.options.extend(update.options);
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

/// Module-specific behaviour plugged into [`BaseModule`]
#[async_trait]
pub trait ModuleBehavior: Send + Sync + 'static {
    /// Build the module's routes from the current configuration
    async fn configure_routes(&self, router: Router, config: &ModuleConfig) -> PluginResult<Router>;

    async fn perform_cleanup(&self) -> PluginResult<()> {
        Ok(())
    }
}

/// Generic [`ApiModule`] implementation
pub struct BaseModule<B> {
    name: String,
    description: String,
    version: String,
    dependencies: Vec<String>,
    behavior: B,
    hooks: ModuleHooks,
    config: RwLock<ModuleConfig>,
    metadata: RwLock<HashMap<String, Value>>,
    router: RwLock<Option<Router>>,
}

impl<B: ModuleBehavior> BaseModule<B> {
    pub fn new(name: impl Into<String>, version: impl Into<String>, behavior: B) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: version.into(),
            dependencies: Vec::new(),
            behavior,
            hooks: ModuleHooks::default(),
            config: RwLock::new(ModuleConfig::default()),
            metadata: RwLock::new(HashMap::new()),
            router: RwLock::new(None),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(self, config: ModuleConfig) -> Self {
        *self.config.write() = config;
        self
    }

    pub fn with_hooks(mut self, hooks: ModuleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn config(&self) -> ModuleConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, update: ModuleConfig) {
        self.config.write().merge(update);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        self.metadata.write().insert(key.into(), value);
    }

    pub fn get_metadata(&self, key: &str) -> Option<Value> {
        self.metadata.read().get(key).cloned()
    }
}

#[async_trait]
impl<B: ModuleBehavior> ApiModule for BaseModule<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn metadata(&self) -> HashMap<String, Value> {
        self.metadata.read().clone()
    }

    fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    fn router(&self) -> Option<Router> {
        self.router.read().clone()
    }

    async fn initialize(&self) -> PluginResult<()> {
        let config = self.config();
        if !config.enabled {
            info!(module = %self.name, "Module disabled, skipping initialization");
            return Ok(());
        }

        self.hooks.run_before_initialize().await?;
        self.hooks.run_before_route_setup().await?;
        let router = self.behavior.configure_routes(Router::new(), &config).await?;
        *self.router.write() = Some(router);
        self.hooks.run_after_route_setup().await?;
        self.hooks.run_after_initialize().await?;

        debug!(module = %self.name, version = %self.version, "Module initialized");
        Ok(())
    }

    async fn cleanup(&self) -> PluginResult<()> {
        self.hooks.run_before_cleanup().await?;
        self.behavior.perform_cleanup().await?;
        self.router.write().take();
        self.hooks.run_after_cleanup().await?;

        debug!(module = %self.name, "Module cleaned up");
        Ok(())
    }
}
