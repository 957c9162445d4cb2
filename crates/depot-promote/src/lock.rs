//! Per-target locks serializing group membership changes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use depot_core::StoreKey;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// Registry handing out one async lock per target store.
///
/// Entries are created on first use and kept for the life of the registry.
/// Locks are not re-entrant: a task holding the lock for a key that asks for
/// it again waits until its own timeout expires.
#[derive(Debug, Default)]
pub struct TargetLockRegistry {
    locks: Mutex<HashMap<StoreKey, Arc<AsyncMutex<()>>>>,
}

impl TargetLockRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &StoreKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Run `on_acquired` while holding the lock for `key`, or `on_timeout` if
    /// the lock is not obtained within `timeout`.
    ///
    /// The lock is released when `on_acquired` finishes, including when its
    /// future panics or is dropped.
    pub async fn lock_and<T, A, AF, O>(
        &self,
        key: &StoreKey,
        timeout: Duration,
        on_acquired: A,
        on_timeout: O,
    ) -> T
    where
        A: FnOnce() -> AF,
        AF: Future<Output = T>,
        O: FnOnce() -> T,
    {
        let lock = self.lock_for(key);
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(target_store = %key, "acquired target lock");
                let output = on_acquired().await;
                drop(guard);
                output
            }
            Err(_) => on_timeout(),
        }
    }

    /// Number of keys that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
