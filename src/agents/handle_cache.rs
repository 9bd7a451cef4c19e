//! Bounded cache of per-tenant built agents.
//!
//! # Responsibilities
//! - Build each tenant's agent at most once per TTL window
//! - Collapse concurrent first requests for a tenant into one build
//! - Keep the number of live handles under `max_size`
//!
//! # Design Decisions
//! - Handles older than `ttl` are rebuilt on next access, not proactively
//! - Over capacity, a sweep drops expired handles and then the least recently used
//! - A failed build caches nothing

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cache::single_flight::SingleFlight;
use crate::client::types::GatewayResult;
use crate::observability::metrics;

/// One built agent and its bookkeeping.
#[derive(Debug)]
pub struct AgentHandle<H> {
    pub tenant_id: String,
    pub built_at: Instant,
    pub expires_at: Instant,
    pub instance: Arc<H>,
}

impl<H> Clone for AgentHandle<H> {
    fn clone(&self) -> Self {
        Self {
            tenant_id: self.tenant_id.clone(),
            built_at: self.built_at,
            expires_at: self.expires_at,
            instance: self.instance.clone(),
        }
    }
}

struct Slot<H> {
    handle: AgentHandle<H>,
    last_used: Instant,
}

/// Admin view of one cached handle.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub tenant_id: String,
    pub age_secs: u64,
    pub expires_in_secs: u64,
    pub idle_secs: u64,
}

pub struct AgentHandleCache<H> {
    ttl: Duration,
    max_size: usize,
    handles: DashMap<String, Slot<H>>,
    builds: SingleFlight<String>,
}

impl<H> AgentHandleCache<H> {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size: max_size.max(1),
            handles: DashMap::new(),
            builds: SingleFlight::new(),
        }
    }

    /// Cached handle for `tenant_id`, or the result of `build`.
    ///
    /// `build` runs at most once across concurrent callers for one tenant.
    pub async fn get_or_build<F, Fut>(&self, tenant_id: &str, build: F) -> GatewayResult<AgentHandle<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<H>>,
    {
        let ttl = self.ttl;
        self.get_or_build_with(tenant_id, |_| ttl, build).await
    }

    /// Like [`AgentHandleCache::get_or_build`], with the handle's lifetime
    /// picked from the built instance. The lifetime is capped at the cache TTL.
    pub async fn get_or_build_with<F, Fut, L>(
        &self,
        tenant_id: &str,
        lifetime: L,
        build: F,
    ) -> GatewayResult<AgentHandle<H>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<H>>,
        L: FnOnce(&H) -> Duration,
    {
        if let Some(handle) = self.lookup(tenant_id) {
            metrics::record_agent_cache("hit");
            return Ok(handle);
        }

        let _flight = self.builds.acquire(tenant_id.to_string()).await;
        if let Some(handle) = self.lookup(tenant_id) {
            metrics::record_agent_cache("hit");
            return Ok(handle);
        }

        metrics::record_agent_cache("miss");
        let started = Instant::now();
        let instance = build().await?;
        let ttl = lifetime(&instance).min(self.ttl);
        let now = Instant::now();
        let handle = AgentHandle {
            tenant_id: tenant_id.to_string(),
            built_at: now,
            expires_at: now + ttl,
            instance: Arc::new(instance),
        };
        self.handles.insert(
            tenant_id.to_string(),
            Slot {
                handle: handle.clone(),
                last_used: now,
            },
        );
        tracing::info!(
            tenant = %tenant_id,
            build_ms = now.duration_since(started).as_millis() as u64,
            ttl_secs = ttl.as_secs(),
            "Agent built"
        );

        if self.handles.len() > self.max_size {
            self.sweep(now);
        }
        Ok(handle)
    }

    pub fn invalidate(&self, tenant_id: &str) -> bool {
        let removed = self.handles.remove(tenant_id).is_some();
        if removed {
            tracing::info!(tenant = %tenant_id, "Agent invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn summaries(&self) -> Vec<AgentSummary> {
        let now = Instant::now();
        let mut out: Vec<AgentSummary> = self
            .handles
            .iter()
            .map(|entry| {
                let slot = entry.value();
                AgentSummary {
                    tenant_id: entry.key().clone(),
                    age_secs: now.duration_since(slot.handle.built_at).as_secs(),
                    expires_in_secs: slot.handle.expires_at.saturating_duration_since(now).as_secs(),
                    idle_secs: now.duration_since(slot.last_used).as_secs(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        out
    }

    fn lookup(&self, tenant_id: &str) -> Option<AgentHandle<H>> {
        let now = Instant::now();
        if let Some(mut slot) = self.handles.get_mut(tenant_id) {
            if now < slot.handle.expires_at {
                slot.last_used = now;
                return Some(slot.handle.clone());
            }
        }
        if self
            .handles
            .remove_if(tenant_id, |_, slot| now >= slot.handle.expires_at)
            .is_some()
        {
            tracing::debug!(tenant = %tenant_id, "Agent expired, rebuilding");
        }
        None
    }

    fn sweep(&self, now: Instant) {
        let before = self.handles.len();
        self.handles.retain(|_, slot| now < slot.handle.expires_at);

        let excess = self.handles.len().saturating_sub(self.max_size);
        if excess > 0 {
            let mut by_use: Vec<(String, Instant)> = self
                .handles
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().last_used))
                .collect();
            by_use.sort_by_key(|(_, used)| *used);
            for (tenant, _) in by_use.into_iter().take(excess) {
                self.handles.remove(&tenant);
            }
        }
        tracing::info!(
            evicted = before - self.handles.len(),
            remaining = self.handles.len(),
            "Agent cache swept"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::GatewayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_fifty_concurrent_first_requests_build_once() {
        let cache = Arc::new(AgentHandleCache::<String>::new(Duration::from_secs(3600), 500));
        let builds = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            let builds = builds.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build("X", || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("agent-X".to_string())
                    })
                    .await
                    .map(|h| h.instance)
            }));
        }

        let mut instances = Vec::new();
        for h in handles {
            instances.push(h.await.unwrap().unwrap());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_handle_is_rebuilt() {
        let cache = AgentHandleCache::<u32>::new(Duration::from_secs(3600), 10);
        let counter = AtomicU32::new(0);
        let builds = &counter;
        let build = move || async move { Ok(builds.fetch_add(1, Ordering::SeqCst) + 1) };

        let first = cache.get_or_build("T1", build).await.unwrap();
        assert_eq!(*first.instance, 1);

        tokio::time::advance(Duration::from_secs(3599)).await;
        let again = cache.get_or_build("T1", build).await.unwrap();
        assert_eq!(*again.instance, 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let rebuilt = cache.get_or_build("T1", build).await.unwrap();
        assert_eq!(*rebuilt.instance, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifetime_is_chosen_per_instance() {
        let cache = AgentHandleCache::<u32>::new(Duration::from_secs(3600), 10);
        let counter = AtomicU32::new(0);
        let builds = &counter;
        let build = move || async move { Ok(builds.fetch_add(1, Ordering::SeqCst) + 1) };
        // The first build is short-lived, later ones keep the full TTL.
        let lifetime = |n: &u32| if *n == 1 { Duration::from_secs(30) } else { Duration::from_secs(7200) };

        let first = cache.get_or_build_with("T1", lifetime, build).await.unwrap();
        assert_eq!(first.expires_at - first.built_at, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(31)).await;
        let second = cache.get_or_build_with("T1", lifetime, build).await.unwrap();
        assert_eq!(*second.instance, 2);
        // Capped at the cache TTL.
        assert_eq!(second.expires_at - second.built_at, Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_least_recently_used() {
        let cache = AgentHandleCache::<&'static str>::new(Duration::from_secs(3600), 2);
        cache.get_or_build("a", || async { Ok("a") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_build("b", || async { Ok("b") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_build("a", || async { Ok("unused") }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_build("c", || async { Ok("c") }).await.unwrap();

        assert_eq!(cache.len(), 2);
        let tenants: Vec<_> = cache.summaries().into_iter().map(|s| s.tenant_id).collect();
        assert_eq!(tenants, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_build_caches_nothing() {
        let cache = AgentHandleCache::<u32>::new(Duration::from_secs(60), 10);
        let err = cache
            .get_or_build("T1", || async { Err(GatewayError::Validation("bad tenant".into())) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(cache.is_empty());

        let ok = cache.get_or_build("T1", || async { Ok(9) }).await.unwrap();
        assert_eq!(*ok.instance, 9);
        assert!(cache.invalidate("T1"));
        assert!(!cache.invalidate("T1"));
    }
}
