//! Runtime wiring
//!
//! Every service is constructed here once and shared through `Arc`; nothing
//! in the host is a global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use cache_manager::CacheManager;
use config_engine::RuntimeSettings;
use crypto::{CryptoConfig, CryptoService};
use error_common::{CareHubError, Result};
use events_bus::{EventBus, EventBusError, Listener};
use plugin_runtime_core::{
    ApiModule, CleanupReport, DuplicatePolicy, InitializationReport, ModuleLoader, ModuleRegistry,
    NativeModuleLoader, PluginLoader, MODULE_FAILED, MODULE_INITIALIZED, MODULE_REGISTERED,
    MODULE_UNREGISTERED,
};
use tracing::{info, warn};

use crate::system;

#[cfg(feature = "redis")]
const REDIS_KEY_PREFIX: &str = "carehub";

/// The host's services
pub struct Runtime {
    settings: RuntimeSettings,
    registry: Arc<ModuleRegistry>,
    events: Arc<EventBus>,
    cache: Arc<CacheManager>,
    crypto: Arc<CryptoService>,
    started_at: Instant,
    // last: plugin libraries must outlive the module handles above
    plugins: PluginLoader,
}

impl Runtime {
    /// Validate `settings` and construct every service
    ///
    /// Plugins are loaded from shared libraries with [`NativeModuleLoader`].
    pub async fn build(settings: RuntimeSettings) -> Result<Self> {
        settings.validate()?;

        let crypto_config = CryptoConfig {
            encryption_key: settings.crypto.encryption_key.clone(),
            keys_dir: settings.crypto.keys_dir.clone(),
            rsa_key_bits: settings.crypto.rsa_key_bits,
            rsa_enabled: settings.crypto.rsa_enabled,
            environment_is_production: settings.environment.is_production(),
        };
        // RSA generation can take seconds
        let crypto = tokio::task::spawn_blocking(move || CryptoService::new(&crypto_config))
            .await
            .map_err(|e| CareHubError::Internal(format!("crypto initialization aborted: {e}")))??;

        let runtime = Self::with_services(settings, crypto, Arc::new(NativeModuleLoader::new()));
        runtime.connect_cache_provider().await?;
        Ok(runtime)
    }

    #[cfg(feature = "redis")]
    async fn connect_cache_provider(&self) -> Result<()> {
        if let Some(url) = &self.settings.cache.redis_url {
            let provider = cache_manager::RedisCacheProvider::connect(url, REDIS_KEY_PREFIX).await?;
            self.cache.set_provider(Arc::new(provider));
            info!("Using Redis cache provider");
        }
        Ok(())
    }

    #[cfg(not(feature = "redis"))]
    async fn connect_cache_provider(&self) -> Result<()> {
        if self.settings.cache.redis_url.is_some() {
            warn!("cache.redis_url is set but the server was built without the `redis` feature");
        }
        Ok(())
    }

    /// Assemble a runtime around an existing crypto service and plugin loader
    pub fn with_services(
        settings: RuntimeSettings,
        crypto: CryptoService,
        module_loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        let events = Arc::new(EventBus::new());

        let policy = if settings.modules.allow_overwrite {
            DuplicatePolicy::Replace
        } else {
            DuplicatePolicy::Reject
        };
        let registry = Arc::new(
            ModuleRegistry::new()
                .with_policy(policy)
                .with_api_version(settings.api.version.clone())
                .with_event_bus(Arc::clone(&events)),
        );

        let cache = Arc::new(CacheManager::in_memory(Duration::from_secs(
            settings.cache.default_ttl_seconds,
        )));
        cache.set_enabled(settings.cache.enabled);
        invalidate_on_module_change(&events, &cache);

        let plugins = PluginLoader::new(
            settings.plugins.directory.clone(),
            Arc::clone(&registry),
            module_loader,
        )
        .with_manifest_file(settings.plugins.manifest_file.clone());

        Self {
            settings,
            registry,
            events,
            cache,
            crypto: Arc::new(crypto),
            started_at: Instant::now(),
            plugins,
        }
    }

    /// Register a compiled-in module; call before [`Runtime::start`]
    pub async fn register_module(&self, module: Arc<dyn ApiModule>) -> Result<()> {
        self.registry.register_module(module).await?;
        Ok(())
    }

    /// Register the `system` module, load plugins and initialize everything
    ///
    /// Plugin failures are logged and reported, never fatal. An invalid
    /// dependency graph is.
    pub async fn start(&self) -> Result<InitializationReport> {
        let system = system::module(&self.registry, &self.cache, &self.events);
        self.registry.register_module(Arc::new(system)).await?;

        if self.settings.plugins.enabled {
            match self.plugins.load_all().await {
                Ok(report) => {
                    for failure in &report.failed {
                        warn!(plugin = %failure.plugin, reason = %failure.reason, "Plugin skipped");
                    }
                }
                Err(e) => warn!(
                    path = %self.plugins.plugins_dir().display(),
                    error = %e,
                    "Plugin directory unavailable, continuing without plugins"
                ),
            }
        }

        let report = self.registry.initialize_all().await?;
        info!(
            modules = report.initialized.len(),
            plugins = self.plugins.loaded_plugins().len(),
            "Runtime started"
        );
        Ok(report)
    }

    /// Application router: `/health` plus every initialized module
    pub fn router(&self) -> Router {
        crate::routes::create_app(self)
    }

    /// Clean up modules in reverse initialization order
    pub async fn shutdown(&self) -> CleanupReport {
        let report = self.registry.cleanup_all().await;
        info!(
            cleaned = report.cleaned.len(),
            failed = report.failed.len(),
            "Runtime stopped"
        );
        report
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn crypto(&self) -> &Arc<CryptoService> {
        &self.crypto
    }

    pub fn plugins(&self) -> &PluginLoader {
        &self.plugins
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// Drop the cached module listing whenever the registry changes
fn invalidate_on_module_change(events: &EventBus, cache: &Arc<CacheManager>) {
    let cache = Arc::clone(cache);
    let listener = Listener::new(move |_| {
        let cache = Arc::clone(&cache);
        async move {
            let key = system::modules_cache_key().map_err(|e| EventBusError::listener(e.to_string()))?;
            cache
                .delete(&key)
                .await
                .map(|_| ())
                .map_err(|e| EventBusError::listener(e.to_string()))
        }
    });
    for event in [MODULE_REGISTERED, MODULE_UNREGISTERED, MODULE_INITIALIZED, MODULE_FAILED] {
        events.on(event, &listener);
    }
}
