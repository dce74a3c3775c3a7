//! Module runtime for the CareHub engine
//!
//! - [`ApiModule`]: the contract every hosted module implements
//! - [`BaseModule`]: ready-made implementation with config, metadata and hooks
//! - [`ModuleRegistry`]: registration, dependency-ordered initialization and
//!   route mounting under `{base}/{version}/{module}` and `{base}/{module}`
//! - [`PluginLoader`]: discovers plugin packages on disk and registers them
//! - [`NativeModuleLoader`]: loads plugins from shared libraries
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use axum::{routing::get, Router};
//! use plugin_runtime_core::{BaseModule, ModuleBehavior, ModuleConfig, ModuleRegistry, PluginResult};
//!
//! struct Patients;
//!
//! #[async_trait]
//! impl ModuleBehavior for Patients {
//!     async fn configure_routes(&self, router: Router, _: &ModuleConfig) -> PluginResult<Router> {
//!         Ok(router.route("/", get(|| async { "[]" })))
//!     }
//! }
//!
//! # async fn run() -> PluginResult<()> {
//! let registry = ModuleRegistry::new();
//! registry
//!     .register_module(Arc::new(BaseModule::new("patients", "1.0.0", Patients)))
//!     .await?;
//! registry.initialize_all().await?;
//! let app: Router = registry.mount_routes("/api", "v1");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod api;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod module;
pub mod native;
pub mod registry;

#[cfg(test)]
mod testing;

pub use api::*;
pub use error::*;
pub use lifecycle::*;
pub use loader::*;
pub use module::*;
pub use native::*;
pub use registry::*;
