use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde_json::Value;
use tracing::debug;

use crate::error::CacheResult;
use crate::provider::CacheProvider;

const SCAN_BATCH: usize = 500;

/// Shared provider backed by Redis
///
/// Keys are namespaced with `prefix` so [`clear`](CacheProvider::clear) only
/// touches this cache's entries. Expiry is delegated to Redis (`PX`).
#[derive(Clone)]
pub struct RedisCacheProvider {
    redis: ConnectionManager,
    prefix: String,
}

impl RedisCacheProvider {
    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self {
            redis,
            prefix: prefix.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(self.namespaced(key)).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(Into::into)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.namespaced(key)).arg(serde_json::to_string(&value)?);
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.redis.clone();
        Ok(conn.exists(self.namespaced(key)).await?)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.redis.clone();
        let removed: u64 = conn.del(self.namespaced(key)).await?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let pattern = match_pattern(&self.prefix);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                removed += keys.len();
                conn.del::<_, ()>(keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        debug!(prefix = %self.prefix, count = removed, "Cleared Redis cache entries");
        Ok(())
    }
}

/// `SCAN MATCH` pattern for every key under `prefix`, glob characters escaped
fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}
