//! In-memory cache backed by moka
//!
//! Values are stored as JSON so one cache can hold any serializable type.
//! Each entry carries its own TTL.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    json: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            json: Arc::new(json),
            ttl,
        })
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.json).context("Failed to deserialize cache value")
    }
}

/// Expire each entry after the TTL it was inserted with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache, default_ttl }
    }

    /// TTL used by callers that have no specific lifetime in mind
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

/// Glob match supporting `*` (any run) and `?` (one char)
fn glob_matches(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.decode()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let doomed: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_matches(pattern, key))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in doomed {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache() -> MemoryCache {
        MemoryCache::new(100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache();
        cache.set("landing", &vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();

        let value: Option<Vec<i32>> = cache.get("landing").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));

        cache.delete("landing").await.unwrap();
        let value: Option<Vec<i32>> = cache.get("landing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = cache();
        cache.set("short", &"v", Duration::from_millis(20)).await.unwrap();
        cache.set("long", &"v", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.cache.run_pending_tasks().await;

        assert!(cache.get::<String>("short").await.unwrap().is_none());
        assert!(cache.get::<String>("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = cache();
        let ttl = Duration::from_secs(60);
        cache.set("media:sources", &1, ttl).await.unwrap();
        cache.set("media:books:1", &2, ttl).await.unwrap();
        cache.set("landing:content", &3, ttl).await.unwrap();

        cache.delete_pattern("media:*").await.unwrap();

        assert!(cache.get::<i32>("media:sources").await.unwrap().is_none());
        assert!(cache.get::<i32>("media:books:1").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("landing:content").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = cache();
        cache.set("a", &1, Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get::<i32>("a").await.unwrap().is_none());
    }

    #[test]
    fn test_glob_matches() {
        assert!(glob_matches("media:*", "media:sources"));
        assert!(glob_matches("media:*", "media:"));
        assert!(glob_matches("user:?:profile", "user:1:profile"));
        assert!(glob_matches("*:content", "landing:content"));
        assert!(glob_matches("a*b*c", "axxbyyc"));
        assert!(!glob_matches("media:*", "landing:content"));
        assert!(!glob_matches("user:?:profile", "user:12:profile"));
    }

    proptest! {
        #[test]
        fn prop_literal_pattern_matches_only_itself(key in "[a-z:]{1,20}", other in "[a-z:]{1,20}") {
            prop_assert!(glob_matches(&key, &key));
            prop_assert_eq!(glob_matches(&key, &other), key == other);
        }

        #[test]
        fn prop_prefix_star_matches_extensions(prefix in "[a-z]{1,8}", rest in "[a-z:]{0,12}") {
            let pattern = format!("{}*", prefix);
            let key = format!("{}{}", prefix, rest);
            prop_assert!(glob_matches(&pattern, &key));
        }
    }
}
