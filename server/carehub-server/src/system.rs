//! Built-in `system` module
//!
//! - `GET /`: summaries of every registered module
//! - `GET /events`: event names with at least one listener

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use cache_manager::{CacheManager, CacheResult};
use error_common::CareHubError;
use events_bus::EventBus;
use plugin_runtime_core::{BaseModule, ModuleBehavior, ModuleConfig, ModuleRegistry, ModuleSummary, PluginResult};

pub const NAME: &str = "system";

const MODULES_CACHE_NAME: &str = "system.modules";
const MODULES_CACHE_TTL: Duration = Duration::from_secs(30);

pub(crate) fn modules_cache_key() -> CacheResult<String> {
    CacheManager::cache_key(MODULES_CACHE_NAME, &())
}

#[derive(Clone)]
pub struct SystemRoutes {
    // weak: the registry owns this module
    registry: Weak<ModuleRegistry>,
    cache: Arc<CacheManager>,
    events: Arc<EventBus>,
}

pub fn module(
    registry: &Arc<ModuleRegistry>,
    cache: &Arc<CacheManager>,
    events: &Arc<EventBus>,
) -> BaseModule<SystemRoutes> {
    let routes = SystemRoutes {
        registry: Arc::downgrade(registry),
        cache: Arc::clone(cache),
        events: Arc::clone(events),
    };
    BaseModule::new(NAME, env!("CARGO_PKG_VERSION"), routes)
        .with_description("Runtime introspection: registered modules and events")
}

#[async_trait]
impl ModuleBehavior for SystemRoutes {
    async fn configure_routes(&self, router: Router, _config: &ModuleConfig) -> PluginResult<Router> {
        let routes = Router::new()
            .route("/", get(list_modules))
            .route("/events", get(list_events))
            .with_state(self.clone());
        Ok(router.merge(routes))
    }
}

async fn list_modules(State(system): State<SystemRoutes>) -> Result<Json<Vec<ModuleSummary>>, CareHubError> {
    let registry = system
        .registry
        .upgrade()
        .ok_or_else(|| CareHubError::Internal("module registry is gone".to_string()))?;

    let modules = system
        .cache
        .cached(MODULES_CACHE_NAME, &(), Some(MODULES_CACHE_TTL), || async move {
            registry.list()
        })
        .await?;
    Ok(Json(modules))
}

async fn list_events(State(system): State<SystemRoutes>) -> Json<Vec<String>> {
    Json(system.events.list_events())
}
