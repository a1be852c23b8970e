//! In-Memory Cache
//!
//! Mutex-guarded map implementation of [`CacheStore`] for tests and local
//! development. TTLs are tracked against `Instant`, so entries expire in
//! real time just like a shared cache would.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{CacheError, CacheResult, CacheStore, Counter};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local [`CacheStore`] implementation
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let entries = self.lock()?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        if entries.get(key).map(|e| e.is_live(now)).unwrap_or(false) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.lock()?;
        entries.remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<Counter> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let count = entry.value.parse::<i64>().unwrap_or(0) + 1;
                entry.value = count.to_string();
                Ok(Counter {
                    count,
                    remaining: entry.expires_at.saturating_duration_since(now),
                })
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(Counter {
                    count: 1,
                    remaining: ttl,
                })
            }
        }
    }

    async fn purge_expired(&self) -> CacheResult<u64> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v1", ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v1".to_string()));

        cache.set("k", "v2", ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);

        assert!(cache.set_if_absent("k", "first", ttl).await.unwrap());
        assert!(!cache.set_if_absent("k", "second", ttl).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some("first".to_string()));

        // An expired entry no longer blocks the conditional set.
        cache.set("gone", "v", Duration::ZERO).await.unwrap();
        assert!(cache.set_if_absent("gone", "fresh", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_counts_and_reports_remaining() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);

        let first = cache.increment("rate:test", ttl).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.remaining <= ttl);

        let second = cache.increment("rate:test", ttl).await.unwrap();
        assert_eq!(second.count, 2);

        // A fresh window starts once the previous one has expired.
        cache.set("rate:test", "9", Duration::ZERO).await.unwrap();
        let reset = cache.increment("rate:test", ttl).await.unwrap();
        assert_eq!(reset.count, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryCache::new();
        cache.set("live", "v", Duration::from_secs(60)).await.unwrap();
        cache.set("dead", "v", Duration::ZERO).await.unwrap();

        let purged = cache.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(cache.get("live").await.unwrap(), Some("v".to_string()));
    }
}
