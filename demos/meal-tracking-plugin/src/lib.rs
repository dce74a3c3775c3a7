//! Example native plugin
//!
//! Build with `cargo build -p meal-tracking-plugin --release`, then copy
//! `manifest.json` and the produced shared library into
//! `<plugins.directory>/meals/`. The host mounts the routes at
//! `/api/v1/meals` and `/api/meals`.

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use plugin_runtime_core::{declare_plugin, BaseModule, ModuleBehavior, ModuleConfig, PluginResult};
use serde_json::{json, Value};

#[derive(Debug, Default)]
pub struct MealTracking;

#[async_trait]
impl ModuleBehavior for MealTracking {
    async fn configure_routes(&self, router: Router, config: &ModuleConfig) -> PluginResult<Router> {
        // overridable through the module's `menu` option
        let menu = config
            .option("menu")
            .cloned()
            .unwrap_or_else(|| json!(["breakfast", "lunch", "dinner"]));

        Ok(router
            .route("/", get(|| async { "meal-tracking" }))
            .route(
                "/menu",
                get(move || {
                    let menu = menu.clone();
                    async move { Json::<Value>(menu) }
                }),
            ))
    }
}

pub fn create() -> BaseModule<MealTracking> {
    BaseModule::new("meals", env!("CARGO_PKG_VERSION"), MealTracking)
        .with_description("Meal tracking for admitted patients")
}

declare_plugin!(create);
