//! Module contract consumed by the registry
//!
//! Anything that can name itself, report a version and hand over an
//! [`axum::Router`] can be registered. Lifecycle callbacks are optional.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::Router;
use serde_json::Value;

use crate::error::PluginResult;

/// A unit of request-handling functionality hosted by the runtime
#[async_trait]
pub trait ApiModule: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Semantic version string
    fn version(&self) -> &str;

    /// Names of modules that must initialize before this one
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Metadata copied into the registry descriptor on registration
    fn metadata(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Routing handle mounted by the registry; `None` mounts nothing
    fn router(&self) -> Option<Router>;

    async fn initialize(&self) -> PluginResult<()> {
        Ok(())
    }

    async fn cleanup(&self) -> PluginResult<()> {
        Ok(())
    }
}
