use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::CacheResult;
use crate::provider::CacheProvider;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local provider
///
/// Expired entries are evicted lazily on access or by
/// [`purge_expired`](Self::purge_expired). There is no size bound.
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let live = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if live.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        live
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCacheProvider::new();
        cache
            .set("census", json!(42), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(cache.get("census").await.unwrap(), Some(json!(42)));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(cache.has("census").await.unwrap());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("census").await.unwrap(), None);
        assert!(!cache.has("census").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_without_ttl_never_expires() {
        let cache = MemoryCacheProvider::new();
        cache.set("ward", json!("north"), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert_eq!(cache.get("ward").await.unwrap(), Some(json!("north")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCacheProvider::new();
        cache.set("a", json!(1), Some(Duration::from_secs(1))).await.unwrap();
        cache.set("b", json!(2), Some(Duration::from_secs(10))).await.unwrap();
        cache.set("c", json!(3), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_clear() {
        let cache = MemoryCacheProvider::new();
        cache.set("a", json!(1), None).await.unwrap();
        cache.set("b", json!(2), Some(Duration::from_secs(1))).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.delete("b").await.unwrap());

        cache.set("c", json!(3), None).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = MemoryCacheProvider::new();
        cache.set("k", json!("old"), None).await.unwrap();
        cache.set("k", json!("new"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("new")));
    }
}
