//! Cache layer
//!
//! Process-local cache for read-mostly public data (landing-page blocks,
//! the media source list). Writers invalidate the keys they touch.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache keys
pub mod keys {
    pub const LANDING_CONTENT: &str = "landing:content";
    pub const SHOWCASED_REVIEWS: &str = "landing:reviews";
    pub const MEDIA_SOURCES: &str = "media:sources";
    pub const LANDING_ALL: &str = "landing:*";
}

/// Cache operations.
///
/// Generic methods make this trait unusable as `dyn CacheLayer`; share
/// a concrete `Arc<Cache>` instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

pub type Cache = MemoryCache;

pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    Arc::new(MemoryCache::new(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}

/// Return the cached value for `key`, or run `load` and cache its result.
///
/// Cache failures are logged and fall through to `load`.
pub async fn get_or_load<T, E, F, Fut>(cache: &Cache, key: &str, load: F) -> Result<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match cache.get::<T>(key).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
    }

    let value = load().await?;
    if let Err(e) = cache.set(key, &value, cache.default_ttl()).await {
        tracing::warn!("Cache write failed for {}: {}", key, e);
    }
    Ok(value)
}

/// Drop a key, logging rather than failing the caller's write
pub async fn invalidate(cache: &Cache, pattern: &str) {
    let result = if pattern.contains(['*', '?']) {
        cache.delete_pattern(pattern).await
    } else {
        cache.delete(pattern).await
    };
    if let Err(e) = result {
        tracing::warn!("Cache invalidation failed for {}: {}", pattern, e);
    }
}
