//! Expiring key/value cache for the CareHub runtime
//!
//! [`CacheManager`] fronts an interchangeable [`CacheProvider`]. The default
//! provider is [`MemoryCacheProvider`]; with the `redis` feature a shared
//! `RedisCacheProvider` is available as well.
//!
//! Method-level caching is explicit at the call site:
//!
//! ```rust
//! use cache_manager::CacheManager;
//!
//! # async fn run() -> cache_manager::CacheResult<()> {
//! let cache = CacheManager::default();
//! let beds = cache
//!     .cached("free_beds", &"north", None, || async { 12_u32 })
//!     .await?;
//! assert_eq!(beds, 12);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod error;
pub mod manager;
pub mod memory;
pub mod provider;
#[cfg(feature = "redis")]
pub mod redis_provider;

pub use error::*;
pub use manager::*;
pub use memory::*;
pub use provider::*;
#[cfg(feature = "redis")]
pub use redis_provider::RedisCacheProvider;
