//! Per-order mutual exclusion.
//!
//! The table keeps weak references, so a lock lives exactly as long as a
//! caller holds or waits on it. Every access goes through moka's per-key
//! compute, which never runs concurrently for the same key: a live lock is
//! never replaced and never dropped from the table, and an entry is removed
//! once its last holder releases it.

use moka::future::Cache;
use moka::ops::compute::Op;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone)]
pub struct OrderLocks {
    locks: Cache<i64, Weak<Mutex<()>>>,
}

impl Default for OrderLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLocks {
    /// Unbounded table; entries leave only when their lock is released.
    pub fn new() -> Self {
        Self {
            locks: Cache::builder().build(),
        }
    }

    /// Waits for exclusive access to `order_id`.
    pub async fn acquire(&self, order_id: i64) -> OrderLockGuard {
        let lock = loop {
            let fresh = Arc::new(Mutex::new(()));
            let candidate = Arc::downgrade(&fresh);

            let result = self
                .locks
                .entry(order_id)
                .and_compute_with(|entry| async move {
                    match entry {
                        Some(entry) if entry.value().strong_count() > 0 => Op::Nop,
                        _ => Op::Put(candidate),
                    }
                })
                .await;

            // The existing lock can lose its last holder between the compute
            // and this upgrade; retry then.
            if let Some(lock) = result
                .into_entry()
                .and_then(|entry| entry.into_value().upgrade())
            {
                break lock;
            }
        };

        OrderLockGuard {
            order_id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> u64 {
        self.locks.run_pending_tasks().await;
        self.locks.entry_count()
    }
}

/// Exclusive access to one order until dropped.
pub struct OrderLockGuard {
    order_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Cache<i64, Weak<Mutex<()>>>,
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let locks = self.locks.clone();
        let order_id = self.order_id;
        runtime.spawn(async move {
            locks
                .entry(order_id)
                .and_compute_with(|entry| async move {
                    match entry {
                        Some(entry) if entry.value().strong_count() == 0 => Op::Remove,
                        _ => Op::Nop,
                    }
                })
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_order_is_exclusive() {
        let locks = OrderLocks::new();
        let held = locks.acquire(7).await;

        let waiting = timeout(Duration::from_millis(50), locks.acquire(7)).await;
        assert!(waiting.is_err(), "second holder got in while the first held the lock");

        drop(held);
        let reacquired = timeout(Duration::from_secs(1), locks.acquire(7)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_orders_do_not_block() {
        let locks = OrderLocks::new();
        let _a = locks.acquire(1).await;
        let b = timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_inherits_lock_after_release() {
        let locks = OrderLocks::new();
        let held = locks.acquire(3).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(3).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_locks_leave_the_table() {
        let locks = OrderLocks::new();
        for order_id in 0..20 {
            drop(locks.acquire(order_id).await);
        }

        let mut remaining = locks.tracked().await;
        for _ in 0..50 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            remaining = locks.tracked().await;
        }
        assert_eq!(remaining, 0);

        let _held = locks.acquire(99).await;
        assert_eq!(locks.tracked().await, 1);
    }
}
