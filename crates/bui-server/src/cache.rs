//! Response cache for expensive reporting endpoints
//!
//! Entries are keyed by request line and caller identity, and live for a
//! fixed TTL. Every key embeds the cache generation: bumping the generation
//! invalidates everything at once, and a body computed before the bump is
//! stored under the old generation where no lookup will ever find it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, info};

/// Cache key, including the generation it was computed under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    generation: u64,
    request: String,
}

impl CacheKey {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct CacheEntry {
    body: Bytes,
    inserted_at: Instant,
}

/// Process-wide response cache
pub struct ResponseCache {
    enabled: bool,
    ttl: Duration,
    generation: AtomicU64,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            generation: AtomicU64::new(0),
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Build the key for a request made by `user` under the current generation
    pub fn key(&self, method: &str, path: &str, query: Option<&str>, user: &str) -> CacheKey {
        let request = match query {
            Some(q) if !q.is_empty() => format!("{} {}?{} user={}", method, path, q, user),
            _ => format!("{} {} user={}", method, path, user),
        };
        CacheKey {
            generation: self.generation.load(Ordering::Acquire),
            request,
        }
    }

    /// Fetch a live entry
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.body.clone())
    }

    /// Store a computed body
    pub fn insert(&self, key: CacheKey, body: Bytes) {
        if !self.enabled {
            return;
        }
        if key.generation != self.generation.load(Ordering::Acquire) {
            debug!("Dropping cache entry computed before invalidation");
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Invalidate every entry
    pub fn clear(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.entries.retain(|k, _| k.generation >= generation);
        info!("Response cache cleared (generation {})", generation);
    }

    /// Drop expired and stale entries
    pub fn cleanup(&self) {
        let generation = self.generation.load(Ordering::Acquire);
        let ttl = self.ttl;
        self.entries
            .retain(|k, e| k.generation == generation && e.inserted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
