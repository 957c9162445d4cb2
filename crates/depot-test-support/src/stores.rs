//! In-memory store directory.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use depot_core::{
    ArtifactStore, ChangeSummary, Group, HostedRepository, StoreDirectory, StoreError,
    StoreResult, StoreKey,
};

#[derive(Debug, Default)]
struct StoresState {
    stores: BTreeMap<StoreKey, ArtifactStore>,
    changes: Vec<ChangeSummary>,
    fail_persist: bool,
    fail_affected: bool,
}

/// Store directory backed by a map, with switchable persistence failures.
#[derive(Debug, Default)]
pub struct MemoryStores {
    state: Mutex<StoresState>,
}

impl MemoryStores {
    /// Empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoresState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a store definition without recording a change.
    pub fn insert(&self, store: impl Into<ArtifactStore>) {
        let store = store.into();
        self.lock().stores.insert(store.key().clone(), store);
    }

    /// Current definition of `key`.
    #[must_use]
    pub fn store(&self, key: &StoreKey) -> Option<ArtifactStore> {
        self.lock().stores.get(key).cloned()
    }

    /// Current definition of group `key`.
    #[must_use]
    pub fn group(&self, key: &StoreKey) -> Option<Group> {
        self.store(key).and_then(ArtifactStore::into_group)
    }

    /// Current definition of hosted repository `key`.
    #[must_use]
    pub fn hosted(&self, key: &StoreKey) -> Option<HostedRepository> {
        self.store(key).and_then(ArtifactStore::into_hosted)
    }

    /// Change summaries of every successful persist, oldest first.
    #[must_use]
    pub fn changes(&self) -> Vec<ChangeSummary> {
        self.lock().changes.clone()
    }

    /// Make every subsequent persist fail.
    pub fn fail_persist(&self, fail: bool) {
        self.lock().fail_persist = fail;
    }

    /// Make affected-group discovery fail.
    pub fn fail_affected_groups(&self, fail: bool) {
        self.lock().fail_affected = fail;
    }
}

#[async_trait]
impl StoreDirectory for MemoryStores {
    async fn exists(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.lock().stores.contains_key(key))
    }

    async fn get(&self, key: &StoreKey) -> StoreResult<Option<ArtifactStore>> {
        Ok(self.store(key))
    }

    async fn persist(&self, store: ArtifactStore, summary: &ChangeSummary) -> StoreResult<bool> {
        let mut state = self.lock();
        if state.fail_persist {
            return Err(StoreError::backend(
                "persist",
                Some(store.key().clone()),
                io::Error::other("injected persist failure"),
            ));
        }
        state.stores.insert(store.key().clone(), store);
        state.changes.push(summary.clone());
        Ok(true)
    }

    async fn groups_affected_by(&self, key: &StoreKey) -> StoreResult<Vec<Group>> {
        let state = self.lock();
        if state.fail_affected {
            return Err(StoreError::backend(
                "groups_affected_by",
                Some(key.clone()),
                io::Error::other("injected topology failure"),
            ));
        }

        let mut reached: BTreeSet<StoreKey> = BTreeSet::from([key.clone()]);
        let mut affected = Vec::new();
        loop {
            let next: Vec<Group> = state
                .stores
                .values()
                .filter_map(ArtifactStore::as_group)
                .filter(|group| !reached.contains(&group.key))
                .filter(|group| group.constituents.iter().any(|member| reached.contains(member)))
                .cloned()
                .collect();
            if next.is_empty() {
                break;
            }
            for group in next {
                reached.insert(group.key.clone());
                affected.push(group);
            }
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn affected_groups_are_transitive() -> anyhow::Result<()> {
        let stores = MemoryStores::new();
        let hosted = StoreKey::hosted("maven", "releases");
        let inner = StoreKey::group("maven", "inner");
        let outer = StoreKey::group("maven", "outer");
        stores.insert(HostedRepository::new("maven", "releases"));
        stores.insert(Group::new("maven", "inner", vec![hosted.clone()]));
        stores.insert(Group::new("maven", "outer", vec![inner.clone()]));
        stores.insert(Group::new("maven", "unrelated", Vec::new()));

        let affected: BTreeSet<StoreKey> = stores
            .groups_affected_by(&hosted)
            .await?
            .into_iter()
            .map(|group| group.key)
            .collect();
        assert_eq!(affected, BTreeSet::from([inner, outer]));
        Ok(())
    }

    #[tokio::test]
    async fn persist_failure_is_injectable() -> anyhow::Result<()> {
        let stores = MemoryStores::new();
        stores.fail_persist(true);
        let result = stores
            .persist(
                HostedRepository::new("maven", "a").into(),
                &ChangeSummary::new("tester", "create"),
            )
            .await;
        assert!(result.is_err());
        assert!(stores.changes().is_empty());
        Ok(())
    }
}
