use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::memory::MemoryCacheProvider;
use crate::provider::CacheProvider;

/// Default time-to-live applied when a caller gives none
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Facade over the active [`CacheProvider`]
///
/// While disabled, reads miss and writes are dropped without touching the
/// provider. Provider errors are returned to the caller unchanged.
pub struct CacheManager {
    provider: RwLock<Arc<dyn CacheProvider>>,
    enabled: AtomicBool,
    default_ttl_secs: AtomicU64,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::in_memory(DEFAULT_TTL)
    }
}

impl CacheManager {
    pub fn new(provider: Arc<dyn CacheProvider>, default_ttl: Duration) -> Self {
        Self {
            provider: RwLock::new(provider),
            enabled: AtomicBool::new(true),
            default_ttl_secs: AtomicU64::new(default_ttl.as_secs()),
        }
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCacheProvider::new()), default_ttl)
    }

    fn provider(&self) -> Arc<dyn CacheProvider> {
        Arc::clone(&self.provider.read())
    }

    /// Swap the storage backend; entries in the old provider are not migrated
    pub fn set_provider(&self, provider: Arc<dyn CacheProvider>) {
        *self.provider.write() = provider;
        info!("Cache provider replaced");
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Cache toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whole seconds only; zero means entries without an explicit TTL never expire
    pub fn set_default_ttl(&self, ttl: Duration) {
        self.default_ttl_secs.store(ttl.as_secs(), Ordering::SeqCst);
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs.load(Ordering::SeqCst))
    }

    // A zero or missing TTL falls back to the default
    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.filter(|ttl| !ttl.is_zero())
            .or_else(|| Some(self.default_ttl()).filter(|ttl| !ttl.is_zero()))
    }

    pub async fn get_value(&self, key: &str) -> CacheResult<Option<Value>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        self.provider().get(key).await
    }

    pub async fn set_value(&self, key: &str, value: Value, ttl: Option<Duration>) -> CacheResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let ttl = self.effective_ttl(ttl);
        self.provider().set(key, value, ttl).await
    }

    /// Typed read; a stored value that no longer deserializes is an error
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.get_value(key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let value = serde_json::to_value(value)?;
        self.set_value(key, value, ttl).await
    }

    pub async fn has(&self, key: &str) -> CacheResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.provider().has(key).await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.provider().delete(key).await
    }

    /// Clears the provider even while the cache is disabled
    pub async fn clear(&self) -> CacheResult<()> {
        self.provider().clear().await
    }

    /// Key used by [`cached`](Self::cached): `{name}:{json args}`
    pub fn cache_key<A: Serialize + ?Sized>(name: &str, args: &A) -> CacheResult<String> {
        Ok(format!("{}:{}", name, serde_json::to_string(args)?))
    }

    /// Return the cached result for `(name, args)` or compute and store it
    pub async fn cached<A, T, F, Fut>(
        &self,
        name: &str,
        args: &A,
        ttl: Option<Duration>,
        compute: F,
    ) -> CacheResult<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = Self::cache_key(name, args)?;
        if let Some(hit) = self.get::<T>(&key).await? {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }
        debug!(key = %key, "Cache miss");
        let value = compute().await;
        self.set(&key, &value, ttl).await?;
        Ok(value)
    }

    /// Like [`cached`](Self::cached) for fallible work; errors are never stored
    pub async fn try_cached<A, T, E, F, Fut>(
        &self,
        name: &str,
        args: &A,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::cache_key(name, args)?;
        if let Some(hit) = self.get::<T>(&key).await? {
            debug!(key = %key, "Cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.set(&key, &value, ttl).await?;
        Ok(value)
    }

    /// Run `work`, then clear the whole cache
    pub async fn invalidate_after<T, Fut>(&self, work: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = T>,
    {
        let output = work.await;
        self.clear().await?;
        Ok(output)
    }

    /// Run fallible `work`; clear the cache only if it succeeds
    pub async fn try_invalidate_after<T, E, Fut>(&self, work: Fut) -> Result<T, E>
    where
        E: From<CacheError>,
        Fut: Future<Output = Result<T, E>>,
    {
        let output = work.await?;
        self.clear().await?;
        Ok(output)
    }
}
