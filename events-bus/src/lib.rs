//! In-process event bus for the CareHub runtime
//!
//! Modules publish notifications through a shared [`EventBus`] instead of
//! calling each other directly. The bus is constructed once by the host and
//! handed to whoever needs it (`Arc<EventBus>`); there is no global instance.
//!
//! # Example
//!
//! ```rust
//! use events_bus::{EventBus, Listener};
//! use serde_json::json;
//!
//! # async fn run() {
//! let bus = EventBus::new();
//! let audit = Listener::sync(|payload| {
//!     tracing::info!(%payload, "patient admitted");
//!     Ok(())
//! });
//! bus.on("patient.admitted", &audit);
//!
//! let report = bus.emit("patient.admitted", json!({ "id": 42 })).await;
//! assert_eq!(report.invoked, 1);
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod bus;
pub mod error;
pub mod handlers;

pub use bus::*;
pub use error::*;
pub use handlers::*;
