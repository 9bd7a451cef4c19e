//! TTL caches with stampede protection.
//!
//! # Responsibilities
//! - Serve fresh entries without touching the network
//! - Collapse concurrent misses for one key into a single upstream fetch
//! - Bound entry count per resource type
//!
//! # Design Decisions
//! - One cache (and one lock namespace) per resource type
//! - Double-checked lookup after acquiring the key's slot
//! - Failed fetches leave the cache unpopulated; the error goes to the caller
//! - Eviction: expired entries first, then least recently accessed

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::single_flight::SingleFlight;
use crate::client::types::GatewayResult;
use crate::observability::metrics;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    last_accessed: Instant,
}

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub resource: String,
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub in_flight: usize,
}

/// Cache for one resource type.
pub struct TtlCache<V: Clone> {
    resource: String,
    max_entries: usize,
    entries: DashMap<String, CacheEntry<V>>,
    flights: SingleFlight<String>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(resource: impl Into<String>, max_entries: usize) -> Self {
        Self {
            resource: resource.into(),
            max_entries: max_entries.max(1),
            entries: DashMap::new(),
            flights: SingleFlight::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Fresh value for `key`, if any. Expired entries are dropped on sight.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if now < entry.expires_at {
                entry.last_accessed = now;
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        None
    }

    /// Store `value` with `expires_at = now + ttl`.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                last_accessed: now,
            },
        );
        if self.entries.len() > self.max_entries {
            self.evict(now);
        }
        metrics::record_cache_size(&self.resource, self.entries.len());
    }

    /// Return the cached value or run `fetch` exactly once across concurrent
    /// callers for the same key.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> GatewayResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<V>>,
    {
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup(&self.resource, "hit");
            tracing::debug!(resource = %self.resource, key = %key, "Cache hit");
            return Ok(value);
        }

        let _flight = self.flights.acquire(key.to_string()).await;

        // A racing holder may have populated the entry while we waited.
        if let Some(value) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup(&self.resource, "coalesced");
            tracing::debug!(resource = %self.resource, key = %key, "Cache filled by concurrent fetch");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(&self.resource, "miss");
        tracing::debug!(resource = %self.resource, key = %key, "Cache miss, fetching");

        match fetch().await {
            Ok(value) => {
                self.insert(key, value.clone(), ttl);
                Ok(value)
            }
            Err(e) => {
                tracing::info!(resource = %self.resource, key = %key, error = %e, "Fetch failed, cache left empty");
                Err(e)
            }
        }
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        metrics::record_cache_size(&self.resource, self.entries.len());
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(&self.resource, 0);
        tracing::debug!(resource = %self.resource, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resource: self.resource.clone(),
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            in_flight: self.flights.in_flight(),
        }
    }

    fn evict(&self, now: Instant) {
        self.entries.retain(|_, entry| now < entry.expires_at);

        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return;
        }
        let mut by_access: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_accessed))
            .collect();
        by_access.sort_by_key(|(_, accessed)| *accessed);
        for (key, _) in by_access.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        tracing::debug!(resource = %self.resource, evicted = excess, "Cache over capacity, evicted entries");
    }
}

/// One [`TtlCache`] per resource type, created lazily.
pub struct CacheRegistry<V: Clone> {
    default_max_entries: usize,
    caches: DashMap<String, Arc<TtlCache<V>>>,
}

impl<V: Clone> CacheRegistry<V> {
    pub fn new(default_max_entries: usize) -> Self {
        Self {
            default_max_entries,
            caches: DashMap::new(),
        }
    }

    /// Pre-create a resource type with its own capacity.
    pub fn register(&self, resource_type: &str, max_entries: usize) -> Arc<TtlCache<V>> {
        self.caches
            .entry(resource_type.to_string())
            .or_insert_with(|| Arc::new(TtlCache::new(resource_type, max_entries)))
            .clone()
    }

    /// Cache for `resource_type`, created with the default capacity if new.
    pub fn cache(&self, resource_type: &str) -> Arc<TtlCache<V>> {
        if let Some(cache) = self.caches.get(resource_type) {
            return cache.clone();
        }
        self.register(resource_type, self.default_max_entries)
    }

    /// Read-through fetch in the namespace of `resource_type`.
    pub async fn cached_fetch<F, Fut>(
        &self,
        resource_type: &str,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> GatewayResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<V>>,
    {
        self.cache(resource_type).get_or_fetch(key, ttl, fetch).await
    }

    pub fn stats(&self) -> BTreeMap<String, CacheStats> {
        self.caches
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    pub fn clear_all(&self) {
        for entry in self.caches.iter() {
            entry.value().clear();
        }
    }
}
