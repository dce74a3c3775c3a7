//! Runtime configuration for the CareHub module runtime
//!
//! Settings are layered with the `config` crate:
//!
//! 1. built-in defaults (every section implements `Default`)
//! 2. an optional YAML, TOML or JSON file
//! 3. environment variables prefixed `CAREHUB__`, nested with `__`
//!    (for example `CAREHUB__CACHE__DEFAULT_TTL_SECONDS=60`)
//!
//! The bare `ENCRYPTION_KEY` variable is honoured as the symmetric key when no
//! layered value supplies one.
//!
//! # Example
//!
//! ```rust,no_run
//! use config_engine::RuntimeSettings;
//!
//! let settings = RuntimeSettings::load(None)?;
//! settings.validate()?;
//! println!("serving under {}/{}", settings.api.base_path, settings.api.version);
//! # Ok::<(), config_engine::ConfigError>(())
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod error;
pub mod settings;
pub mod validation;

pub use error::*;
pub use settings::*;
pub use validation::ConfigValidator;
