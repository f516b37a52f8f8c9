//! services/api/src/adapters/cache.rs
//!
//! In-process response cache with per-entry expiry.

use async_trait::async_trait;
use cookstack_core::ports::{CachedResponse, ResponseCache};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Default)]
struct Entries {
    generation: u64,
    map: HashMap<String, (Instant, CachedResponse)>,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.map.len();
        entries.map.retain(|_, (expires_at, _)| *expires_at > now);
        before - entries.map.len()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn generation(&self) -> u64 {
        self.entries.read().await.generation
    }

    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        match entries.map.get(key) {
            Some((expires_at, response)) if *expires_at > Instant::now() => Some(response.clone()),
            _ => None,
        }
    }

    async fn put(&self, key: &str, response: CachedResponse, ttl: Duration, generation: u64) {
        let mut entries = self.entries.write().await;
        // Checked under the same lock `clear` takes.
        if entries.generation != generation {
            return;
        }
        entries
            .map
            .insert(key.to_string(), (Instant::now() + ttl, response));
    }

    async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.generation = entries.generation.wrapping_add(1);
        entries.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new();
        let generation = cache.generation().await;
        cache.put("a", ok("1"), Duration::from_secs(60), generation).await;
        cache.put("b", ok("2"), Duration::ZERO, generation).await;

        assert_eq!(cache.get("a").await, Some(ok("1")));
        assert_eq!(cache.get("b").await, None);
        assert_eq!(cache.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = MemoryCache::new();
        let generation = cache.generation().await;
        cache.put("a", ok("1"), Duration::from_secs(60), generation).await;
        cache.clear().await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn a_put_rendered_before_a_clear_is_dropped() {
        let cache = MemoryCache::new();
        let before = cache.generation().await;

        // A mutation lands between the read and the store.
        cache.clear().await;
        cache.put("a", ok("stale"), Duration::from_secs(60), before).await;
        assert_eq!(cache.get("a").await, None);

        let after = cache.generation().await;
        assert_ne!(before, after);
        cache.put("a", ok("fresh"), Duration::from_secs(60), after).await;
        assert_eq!(cache.get("a").await, Some(ok("fresh")));
    }
}
