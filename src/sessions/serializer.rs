//! Per-conversation serialization.
//!
//! # Responsibilities
//! - Process messages of one session strictly one at a time, in arrival order
//! - Leave different sessions fully concurrent
//!
//! # Design Decisions
//! - One FIFO `tokio::sync::Mutex` per session, created lazily
//! - Once the map passes the high-water mark, locks with no holder and no
//!   waiter are swept before a new one is created

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub locks: usize,
    pub busy: usize,
    pub high_water_mark: usize,
}

#[derive(Debug)]
pub struct SessionSerializer {
    locks: DashMap<String, Arc<Mutex<()>>>,
    high_water_mark: usize,
}

impl SessionSerializer {
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            locks: DashMap::new(),
            high_water_mark,
        }
    }

    /// Run `f` while holding the session's lock.
    ///
    /// The lock is released when `f` completes or the returned future is dropped.
    pub async fn with_session<F, Fut, T>(&self, session_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock_owned().await;
        tracing::trace!(session = %session_id, "Session lock acquired");
        f().await
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(session_id) {
            return lock.clone();
        }
        if self.locks.len() >= self.high_water_mark {
            self.sweep_idle();
        }
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop locks nobody holds or waits on. Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let before = self.locks.len();
        // A holder or waiter keeps its own clone of the Arc.
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before - self.locks.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.locks.len(), "Swept idle session locks");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            locks: self.locks.len(),
            busy: self
                .locks
                .iter()
                .filter(|entry| Arc::strong_count(entry.value()) > 1)
                .count(),
            high_water_mark: self.high_water_mark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_runs_in_arrival_order() {
        let serializer = Arc::new(SessionSerializer::new(100));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = {
            let serializer = serializer.clone();
            let log = log.clone();
            tokio::spawn(async move {
                serializer
                    .with_session("S", || async move {
                        log.lock().unwrap().push("m1 start");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        log.lock().unwrap().push("m1 end");
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = {
            let serializer = serializer.clone();
            let log = log.clone();
            tokio::spawn(async move {
                serializer
                    .with_session("S", || async move {
                        log.lock().unwrap().push("m2 start");
                        log.lock().unwrap().push("m2 end");
                    })
                    .await
            })
        };

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["m1 start", "m1 end", "m2 start", "m2 end"]
        );
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let serializer = Arc::new(SessionSerializer::new(100));
        let s = serializer.clone();
        let holder = tokio::spawn(async move {
            s.with_session("A", || tokio::time::sleep(Duration::from_secs(5))).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let other = tokio::time::timeout(
            Duration::from_millis(200),
            serializer.with_session("B", || async { 42 }),
        )
        .await;
        assert_eq!(other.unwrap(), 42);
        holder.abort();
    }

    #[tokio::test]
    async fn test_idle_locks_swept_past_high_water_mark() {
        let serializer = SessionSerializer::new(3);
        for id in ["a", "b", "c"] {
            serializer.with_session(id, || async {}).await;
        }
        assert_eq!(serializer.len(), 3);

        serializer.with_session("d", || async {}).await;
        assert_eq!(serializer.len(), 1);
        assert_eq!(serializer.stats().busy, 0);
    }
}
