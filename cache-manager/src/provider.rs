use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheResult;

/// Storage backend behind [`CacheManager`](crate::CacheManager)
///
/// `ttl` of `None` stores the entry without expiry. Reads of an expired entry
/// must behave as if the key were absent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()>;

    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Returns whether a live entry was removed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn clear(&self) -> CacheResult<()>;
}
