//! Per-`(post, user)` mutual exclusion for toggles.
//!
//! Entries are created on demand and removed by the last guard holder, so the
//! table only holds pairs with a toggle in flight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

type PairKey = (String, String);

#[derive(Debug, Clone, Default)]
pub struct PairLocks {
    slots: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other toggle of this pair is running.
    pub async fn acquire(&self, post_id: &str, user_id: &str) -> PairGuard {
        let key = (post_id.to_string(), user_id.to_string());
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        trace!(post_id, user_id, "pair lock acquired");
        PairGuard {
            guard: Some(guard),
            key: Some(key),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of pairs with a held or awaited lock.
    pub fn active(&self) -> usize {
        self.slots.len()
    }
}

/// Holds a pair lock until dropped. `Send`, so it can move into a spawned task.
#[derive(Debug)]
pub struct PairGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: Option<PairKey>,
    slots: Arc<DashMap<PairKey, Arc<Mutex<()>>>>,
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only waiters.
        drop(self.guard.take());
        if let Some(key) = self.key.take() {
            self.slots
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn table_empties_after_release() {
        let locks = PairLocks::new();
        let guard = locks.acquire("post-1", "user-1").await;
        assert_eq!(locks.active(), 1);
        drop(guard);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn distinct_pairs_do_not_block() {
        let locks = PairLocks::new();
        let _a = locks.acquire("post-1", "user-1").await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire("post-1", "user-2"),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_pair_is_serialized() {
        let locks = PairLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _guard = locks.acquire("post-1", "user-1").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("task joins");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }
}
