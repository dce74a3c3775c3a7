use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, middleware::from_fn, routing::get, Json, Router};
use plugin_runtime_core::ModuleRegistry;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::request_timing_middleware;
use crate::runtime::Runtime;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub modules: usize,
    pub initialized_modules: usize,
}

#[derive(Clone)]
struct HealthState {
    registry: Arc<ModuleRegistry>,
    started_at: Instant,
}

/// Health check handler
async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let modules = state.registry.list();
    let initialized_modules = modules.iter().filter(|m| m.state.is_initialized()).count();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        modules: modules.len(),
        initialized_modules,
    })
}

/// Create the main application router with all routes and middleware
pub fn create_app(runtime: &Runtime) -> Router {
    let api = &runtime.settings().api;
    let health = HealthState {
        registry: Arc::clone(runtime.registry()),
        started_at: runtime.started_at(),
    };

    Router::new()
        .route("/health", get(health_check))
        .with_state(health)
        .merge(runtime.registry().mount_routes(&api.base_path, &api.version))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(request_timing_middleware)),
        )
}
