//! Collaborator interfaces consumed by the promotion engine.

use std::collections::BTreeSet;
use std::pin::Pin;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::{CallbackError, ContentResult, StoreResult, ValidationError};
use crate::model::{
    ArtifactStore, CallbackTarget, ChangeSummary, ConcreteResource, Group, GroupPromoteResult,
    PathsPromoteResult, PromoteRequestRef, SpecialPathInfo, StoreKey, StoreType, Transfer,
    ValidationResult,
};

/// Stream of content bytes read from a store.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

/// Store definitions and group topology.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    /// Whether a store with `key` exists.
    async fn exists(&self, key: &StoreKey) -> StoreResult<bool>;

    /// Fetch the definition of `key`, if any.
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<ArtifactStore>>;

    /// Persist a store definition; returns whether it was stored.
    async fn persist(&self, store: ArtifactStore, summary: &ChangeSummary) -> StoreResult<bool>;

    /// Groups containing `key` directly or through nested groups.
    async fn groups_affected_by(&self, key: &StoreKey) -> StoreResult<Vec<Group>>;
}

/// Path-level content operations on stores.
///
/// Writes issued through this trait are promotion writes and ignore the
/// read-only flag of hosted repositories.
#[async_trait]
pub trait ContentAccess: Send + Sync {
    /// Every file under `root` in `store`.
    async fn list_recursively(&self, store: &StoreKey, root: &str) -> ContentResult<Vec<Transfer>>;

    /// Handles for the given paths in `store`, whether or not they exist.
    async fn resolve_transfers(
        &self,
        store: &StoreKey,
        paths: &BTreeSet<String>,
    ) -> ContentResult<Vec<Transfer>>;

    /// Whether content exists behind `transfer`.
    async fn exists(&self, transfer: &Transfer) -> ContentResult<bool>;

    /// Open `transfer` for reading.
    async fn open_read(&self, transfer: &Transfer) -> ContentResult<ContentStream>;

    /// Handle for writing `path` into `store`.
    async fn open_for_write(&self, store: &StoreKey, path: &str) -> ContentResult<Transfer>;

    /// Write `content` to `transfer`, returning the byte count.
    async fn write(&self, transfer: &Transfer, content: ContentStream) -> ContentResult<u64>;

    /// Delete `path` from `store`; returns whether anything was removed.
    async fn delete(&self, store: &StoreKey, path: &str) -> ContentResult<bool>;

    /// Whether `transfer` lives in a store backed by a remote origin.
    fn is_remote_backed(&self, transfer: &Transfer) -> bool {
        transfer.store().store_type == StoreType::Remote
    }

    /// Fetch `transfer` again from its origin.
    async fn redownload(&self, transfer: &Transfer) -> ContentResult<Option<Transfer>>;
}

/// Identifies paths that need special promotion handling.
pub trait SpecialPathClassifier: Send + Sync {
    /// Classification of `transfer`, or `None` for ordinary content.
    fn classify(&self, transfer: &Transfer, package_type: &str) -> Option<SpecialPathInfo>;
}

/// Runs the validation rule set attached to a promotion target.
#[async_trait]
pub trait PromotionValidator: Send + Sync {
    /// Validate `request`; rule failures are reported inside the result.
    async fn validate(
        &self,
        request: PromoteRequestRef<'_>,
        base_url: Option<&str>,
    ) -> Result<ValidationResult, ValidationError>;
}

/// Negative ("not found") cache.
#[async_trait]
pub trait NotFoundCache: Send + Sync {
    /// Drop the missing marker for `resource`.
    async fn clear_missing(&self, resource: &ConcreteResource);
}

/// Result body delivered to a callback.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum CallbackPayload<'a> {
    /// Path promotion result.
    Paths(&'a PathsPromoteResult),
    /// Group promotion result.
    Group(&'a GroupPromoteResult),
}

/// Delivers terminal results of asynchronous promotions.
#[async_trait]
pub trait CallbackPoster: Send + Sync {
    /// Deliver `payload` to `target`.
    async fn deliver(
        &self,
        target: &CallbackTarget,
        payload: CallbackPayload<'_>,
    ) -> Result<(), CallbackError>;
}
