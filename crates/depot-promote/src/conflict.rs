//! Guard against concurrent promotions writing the same target paths.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use depot_core::StoreKey;
use tracing::debug;

type Registrations = HashMap<StoreKey, HashMap<u64, BTreeSet<String>>>;

/// Tracks the path sets currently being promoted into each target.
///
/// Two registrations conflict when they name the same target and share at
/// least one path.
#[derive(Debug, Default)]
pub struct PathConflictManager {
    in_flight: Mutex<Registrations>,
    next_id: AtomicU64,
}

struct Registration<'a> {
    manager: &'a PathConflictManager,
    target: StoreKey,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.manager.lock();
        if let Some(entries) = in_flight.get_mut(&self.target) {
            entries.remove(&self.id);
            if entries.is_empty() {
                in_flight.remove(&self.target);
            }
        }
    }
}

impl PathConflictManager {
    /// Empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registrations> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_register(&self, target: &StoreKey, paths: &BTreeSet<String>) -> Option<Registration<'_>> {
        let mut in_flight = self.lock();
        let overlaps = in_flight.get(target).is_some_and(|entries| {
            entries
                .values()
                .any(|registered| !registered.is_disjoint(paths))
        });
        if overlaps {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        in_flight
            .entry(target.clone())
            .or_default()
            .insert(id, paths.clone());
        drop(in_flight);
        Some(Registration {
            manager: self,
            target: target.clone(),
            id,
        })
    }

    /// Atomically register `paths` for `target` and run `on_no_conflict`, or
    /// run `on_conflict` when an overlapping registration is in flight.
    ///
    /// The registration is removed once `on_no_conflict` completes.
    pub async fn check_and<T, N, NF, C>(
        &self,
        target: &StoreKey,
        paths: &BTreeSet<String>,
        on_no_conflict: N,
        on_conflict: C,
    ) -> T
    where
        N: FnOnce() -> NF,
        NF: Future<Output = T>,
        C: FnOnce() -> T,
    {
        let Some(registration) = self.try_register(target, paths) else {
            debug!(target_store = %target, "path conflict detected");
            return on_conflict();
        };
        let output = on_no_conflict().await;
        drop(registration);
        output
    }

    /// Number of targets with promotions in flight.
    #[must_use]
    pub fn active_targets(&self) -> usize {
        self.lock().len()
    }
}
