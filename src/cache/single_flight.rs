//! Per-key single-flight slots.
//!
//! A slot is a mutex that exists only while someone holds or awaits it. The
//! last guard to release removes the slot, so the map never grows with the
//! set of keys ever seen.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed lock namespace.
#[derive(Debug)]
pub struct SingleFlight<K>
where
    K: Eq + Hash + Clone,
{
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K> SingleFlight<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive ownership of `key`.
    ///
    /// Waiters are served in FIFO order. The returned guard releases on drop,
    /// including when the holding future is cancelled.
    pub async fn acquire(&self, key: K) -> FlightGuard<K> {
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.clone().lock_owned().await;
        FlightGuard {
            key,
            slots: self.slots.clone(),
            slot,
            _guard: guard,
        }
    }

    /// Slots currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for SingleFlight<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on one key's slot.
pub struct FlightGuard<K>
where
    K: Eq + Hash + Clone,
{
    key: K,
    slots: Arc<DashMap<K, Arc<Mutex<()>>>>,
    slot: Arc<Mutex<()>>,
    _guard: OwnedMutexGuard<()>,
}

impl<K> Drop for FlightGuard<K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // References: the map, `self.slot`, and the owned guard. Anything
        // beyond that is a waiter, which keeps the slot alive. New waiters
        // clone under the same shard lock `remove_if` takes.
        self.slots.remove_if(&self.key, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) <= 3
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let flights: SingleFlight<String> = SingleFlight::new();
        {
            let _guard = flights.acquire("T1".to_string()).await;
            assert_eq!(flights.in_flight(), 1);
        }
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_holders_are_mutually_exclusive() {
        let flights = Arc::new(SingleFlight::<String>::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let flights = flights.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = flights.acquire("key".to_string()).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flights: SingleFlight<&'static str> = SingleFlight::new();
        let _a = flights.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), flights.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_holder_releases() {
        let flights = Arc::new(SingleFlight::<&'static str>::new());
        let f = flights.clone();
        let holder = tokio::spawn(async move {
            let _guard = f.acquire("k").await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        holder.abort();
        let _ = holder.await;

        let next = tokio::time::timeout(Duration::from_millis(100), flights.acquire("k")).await;
        assert!(next.is_ok());
    }
}
