//! CareHub server - hosts the module runtime behind one HTTP API
//!
//! [`Runtime`] owns the module registry, plugin loader, event bus, cache and
//! crypto service. [`Runtime::router`] mounts every initialized module under
//! `{base}/{version}/{module}` and the legacy `{base}/{module}`, next to
//! `GET /health`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod middleware;
pub mod routes;
pub mod runtime;
pub mod system;

pub use routes::create_app;
pub use runtime::Runtime;
