//! Per-layout mutual exclusion.
//!
//! [`LayoutLockManager`] keeps one mutex per [`LayoutKey`] in a `DashMap`.
//! An action holds its layout's guard from the moment it loads the working
//! copy until the commit finished, so duplicated submissions for the same
//! layout run one after the other while other layouts proceed in parallel.
//!
//! Locks are taken with `blocking_lock_owned`, so [`LayoutLockManager::lock`]
//! must only be called from a blocking thread (a `spawn_blocking` task, a
//! plain thread or the CLI), never directly on the async runtime.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use portlayout_storage::LayoutKey;

/// Held while an action runs against one layout.
pub type LayoutGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct LayoutLockManager {
    locks: DashMap<LayoutKey, Arc<Mutex<()>>>,
}

impl LayoutLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock for `key` is free and returns its guard.
    pub fn lock(&self, key: LayoutKey) -> LayoutGuard {
        // Clone the Arc out so the shard lock is not held while waiting.
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.blocking_lock_owned()
    }

    /// Non-blocking variant; `None` if another action holds the layout.
    pub fn try_lock(&self, key: LayoutKey) -> Option<LayoutGuard> {
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.try_lock_owned().ok()
    }

    /// Number of layouts that have been locked at least once.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portlayout_core::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_key_is_exclusive() {
        let locks = LayoutLockManager::new();
        let key = LayoutKey::default_for(UserId(1));
        let guard = locks.lock(key);
        assert!(locks.try_lock(key).is_none());
        drop(guard);
        assert!(locks.try_lock(key).is_some());
    }

    #[test]
    fn different_keys_are_independent() {
        let locks = LayoutLockManager::new();
        let _a = locks.lock(LayoutKey::default_for(UserId(1)));
        assert!(locks.try_lock(LayoutKey::default_for(UserId(2))).is_some());
        assert_eq!(locks.tracked(), 2);
    }

    #[test]
    fn critical_sections_do_not_overlap() {
        let locks = Arc::new(LayoutLockManager::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let key = LayoutKey::default_for(UserId(7));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = locks.lock(key);
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
