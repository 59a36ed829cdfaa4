use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::*;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::task_queue::credential_key;

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Named async locks, shared between the task queue and every caller that opens a supplier session outside it.
///
/// Holding the lock for `credential:<id>` means no other supplier session for that credential is open. Entries are
/// dropped as soon as nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Releases its key when dropped.
pub struct KeyGuard {
    key: String,
    mutex: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    owner: KeyedLocks,
}

impl KeyedLocks {
    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits until `key` is free and takes it. Waiters are served in arrival order.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = Arc::clone(self.map().entry(key.to_string()).or_default());
        let guard = Arc::clone(&mutex).lock_owned().await;
        trace!("⏱️ Took {key}");
        KeyGuard { key: key.to_string(), mutex, guard: Some(guard), owner: self.clone() }
    }

    pub async fn lock_credential(&self, credential_id: i64) -> KeyGuard {
        self.lock(&credential_key(credential_id)).await
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.map().get(key).map(|m| m.try_lock().is_err()).unwrap_or(false)
    }

    /// The number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str, mutex: &Arc<AsyncMutex<()>>) {
        let mut map = self.map();
        // One reference in the map, one in the guard being dropped. Anything more is a waiter.
        let unused = map.get(key).map(|m| Arc::ptr_eq(m, mutex) && Arc::strong_count(m) == 2).unwrap_or(false);
        if unused {
            map.remove(key);
        }
        // A waiter that gave up (its future was dropped) leaves an entry nobody references.
        map.retain(|_, m| Arc::strong_count(m) > 1);
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.release(&self.key, &self.mutex);
        trace!("⏱️ Released {}", self.key);
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn entries_are_dropped_when_free() {
        let locks = KeyedLocks::default();
        let guard = locks.lock_credential(3).await;
        assert!(locks.is_locked("credential:3"));
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(!locks.is_locked("credential:3"));
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn waiters_keep_the_entry_alive() {
        let locks = KeyedLocks::default();
        let first = locks.lock("credential:9").await;
        let l2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = l2.lock("credential:9").await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn a_waiter_that_gives_up_leaves_nothing_behind() {
        let locks = KeyedLocks::default();
        let first = locks.lock_credential(4).await;
        let gave_up = tokio::time::timeout(Duration::from_millis(10), locks.lock_credential(4)).await;
        assert!(gave_up.is_err());
        drop(first);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::default();
        let _a = locks.lock_credential(1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock_credential(2)).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
