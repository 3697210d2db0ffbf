use async_trait::async_trait;
use dashmap::DashMap;
use postmap_core::model::PostMap;
use std::time::Duration;
use tokio::time::Instant;

/// Storage for built maps. Entries expire after the ttl given to `set`.
#[async_trait]
pub trait MapCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<PostMap>;
    async fn set(&self, key: String, map: PostMap, ttl: Duration);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: PostMap,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache. There is no size bound; entries leave only by expiring or being replaced.
#[derive(Debug, Default)]
pub struct InMemoryMapCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MapCache for InMemoryMapCache {
    async fn get(&self, key: &str) -> Option<PostMap> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    async fn set(&self, key: String, map: PostMap, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(
            key,
            CacheEntry {
                value: map,
                expires_at,
            },
        );
    }
}

/// Never stores anything; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMapCache;

#[async_trait]
impl MapCache for DisabledMapCache {
    async fn get(&self, _key: &str) -> Option<PostMap> {
        None
    }

    async fn set(&self, _key: String, _map: PostMap, _ttl: Duration) {}
}
