//! Common error handling utilities for the CareHub runtime
//!
//! Every runtime crate keeps its own `thiserror` enum close to the code that
//! raises it. This crate is the meeting point at the host boundary: each of
//! those enums converts into [`CareHubError`], which carries a stable error
//! code and knows how to render itself as an HTTP response without leaking
//! internal details.
//!
//! # Error Categories
//!
//! - **Configuration**: missing or invalid settings, manifests, keys
//! - **Module / Plugin**: lifecycle and loading failures
//! - **Integrity**: malformed ciphertext, failed authentication tags
//! - **Crypto / Cache / Event**: failures from the runtime services
//! - **Internal**: anything unexpected
//!
//! # Example
//!
//! ```rust
//! use error_common::{CareHubError, codes};
//!
//! let err = CareHubError::Integrity("authentication tag mismatch".to_string());
//! assert_eq!(err.code(), codes::integrity::TAG_MISMATCH);
//! assert_eq!(err.status_code().as_u16(), 400);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod codes;
pub mod response;
pub mod types;

pub use response::*;
pub use types::*;
