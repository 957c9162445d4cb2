//! In-memory content access with injectable write and delete failures.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use depot_core::{ContentAccess, ContentError, ContentResult, ContentStream, StoreKey, Transfer};
use tokio::io::AsyncReadExt;

type Files = BTreeMap<StoreKey, BTreeMap<String, Vec<u8>>>;

#[derive(Debug, Default)]
struct ContentState {
    files: Files,
    origins: Files,
    failing_writes: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    write_delay: Duration,
    writes: usize,
}

/// Content store keyed by store and path.
///
/// Remote stores can be given origin content, which `redownload` copies into
/// the store the way a proxy fetch would.
#[derive(Debug, Default)]
pub struct MemoryContent {
    state: Mutex<ContentState>,
}

impl MemoryContent {
    /// Empty content store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `bytes` at `path` in `store`.
    pub fn put(&self, store: &StoreKey, path: &str, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .files
            .entry(store.clone())
            .or_default()
            .insert(path.to_string(), bytes.into());
    }

    /// Content at `path` in `store`.
    #[must_use]
    pub fn get(&self, store: &StoreKey, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(store)
            .and_then(|files| files.get(path))
            .cloned()
    }

    /// Whether `path` exists in `store`.
    #[must_use]
    pub fn contains(&self, store: &StoreKey, path: &str) -> bool {
        self.get(store, path).is_some()
    }

    /// Every path stored in `store`.
    #[must_use]
    pub fn paths(&self, store: &StoreKey) -> BTreeSet<String> {
        self.lock()
            .files
            .get(store)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Content the origin of remote `store` serves for `path`.
    pub fn put_origin(&self, store: &StoreKey, path: &str, bytes: impl Into<Vec<u8>>) {
        self.lock()
            .origins
            .entry(store.clone())
            .or_default()
            .insert(path.to_string(), bytes.into());
    }

    /// Fail every write of `path`, in any store.
    pub fn fail_writes_for(&self, path: &str) {
        self.lock().failing_writes.insert(path.to_string());
    }

    /// Fail every delete of `path`, in any store.
    pub fn fail_deletes_for(&self, path: &str) {
        self.lock().failing_deletes.insert(path.to_string());
    }

    /// Delay applied before each write completes.
    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    /// Number of successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

#[async_trait]
impl ContentAccess for MemoryContent {
    async fn list_recursively(&self, store: &StoreKey, root: &str) -> ContentResult<Vec<Transfer>> {
        let prefix = root.trim_start_matches('/');
        Ok(self
            .paths(store)
            .into_iter()
            .filter(|path| path.starts_with(prefix))
            .map(|path| Transfer::new(store.clone(), path))
            .collect())
    }

    async fn resolve_transfers(
        &self,
        store: &StoreKey,
        paths: &BTreeSet<String>,
    ) -> ContentResult<Vec<Transfer>> {
        Ok(paths
            .iter()
            .map(|path| Transfer::new(store.clone(), path.clone()))
            .collect())
    }

    async fn exists(&self, transfer: &Transfer) -> ContentResult<bool> {
        Ok(self.contains(transfer.store(), transfer.path()))
    }

    async fn open_read(&self, transfer: &Transfer) -> ContentResult<ContentStream> {
        let bytes = self
            .get(transfer.store(), transfer.path())
            .ok_or_else(|| ContentError::NotFound {
                store: transfer.store().clone(),
                path: transfer.path().to_string(),
            })?;
        Ok(Box::pin(io::Cursor::new(bytes)))
    }

    async fn open_for_write(&self, store: &StoreKey, path: &str) -> ContentResult<Transfer> {
        Ok(Transfer::new(store.clone(), path))
    }

    async fn write(&self, transfer: &Transfer, mut content: ContentStream) -> ContentResult<u64> {
        let (delay, failing) = {
            let state = self.lock();
            (
                state.write_delay,
                state.failing_writes.contains(transfer.path()),
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(ContentError::io(
                "write",
                transfer.store(),
                transfer.path(),
                io::Error::other("injected write failure"),
            ));
        }

        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .await
            .map_err(|err| ContentError::io("write", transfer.store(), transfer.path(), err))?;
        let written = bytes.len() as u64;
        let mut state = self.lock();
        state
            .files
            .entry(transfer.store().clone())
            .or_default()
            .insert(transfer.path().to_string(), bytes);
        state.writes += 1;
        Ok(written)
    }

    async fn delete(&self, store: &StoreKey, path: &str) -> ContentResult<bool> {
        let mut state = self.lock();
        if state.failing_deletes.contains(path) {
            return Err(ContentError::io(
                "delete",
                store,
                path,
                io::Error::other("injected delete failure"),
            ));
        }
        Ok(state
            .files
            .get_mut(store)
            .is_some_and(|files| files.remove(path).is_some()))
    }

    async fn redownload(&self, transfer: &Transfer) -> ContentResult<Option<Transfer>> {
        let mut state = self.lock();
        let Some(bytes) = state
            .origins
            .get(transfer.store())
            .and_then(|files| files.get(transfer.path()))
            .cloned()
        else {
            return Ok(None);
        };
        state
            .files
            .entry(transfer.store().clone())
            .or_default()
            .insert(transfer.path().to_string(), bytes);
        Ok(Some(transfer.clone()))
    }
}
