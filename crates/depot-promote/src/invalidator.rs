//! Detached negative-cache invalidation after successful promotions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use depot_core::{
    ConcreteResource, ContentAccess, Group, NotFoundCache, StoreDirectory, StoreKey, error_chain,
};
use depot_telemetry::Metrics;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, info, warn};

/// Schedules "missing" marker removal for promoted paths in the target and
/// every group affected by it.
///
/// Each task runs detached with a deadline; its outcome never changes the
/// promotion result.
#[derive(Clone)]
pub struct NfcInvalidator {
    nfc: Arc<dyn NotFoundCache>,
    stores: Arc<dyn StoreDirectory>,
    content: Arc<dyn ContentAccess>,
    deadline: Duration,
    metrics: Metrics,
}

impl NfcInvalidator {
    /// Build an invalidator whose tasks give up after `deadline`.
    #[must_use]
    pub fn new(
        nfc: Arc<dyn NotFoundCache>,
        stores: Arc<dyn StoreDirectory>,
        content: Arc<dyn ContentAccess>,
        deadline: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            nfc,
            stores,
            content,
            deadline,
            metrics,
        }
    }

    /// Clear `paths` in `target` and in each of `affected`.
    pub fn schedule_paths(
        &self,
        target: StoreKey,
        paths: BTreeSet<String>,
        affected: Vec<Group>,
    ) -> JoinHandle<()> {
        let nfc = Arc::clone(&self.nfc);
        let stores: Vec<StoreKey> = std::iter::once(target)
            .chain(affected.into_iter().map(|group| group.key))
            .collect();
        self.spawn_bounded("paths", async move {
            clear_all(nfc.as_ref(), &stores, &paths).await;
            Ok(())
        })
    }

    /// Clear every path of `member` in `group` and in the groups affected by
    /// `group`.
    pub fn schedule_group_member(&self, group: StoreKey, member: StoreKey) -> JoinHandle<()> {
        let nfc = Arc::clone(&self.nfc);
        let stores_dir = Arc::clone(&self.stores);
        let content = Arc::clone(&self.content);
        self.spawn_bounded("group", async move {
            let paths: BTreeSet<String> = content
                .list_recursively(&member, "/")
                .await
                .map_err(|err| error_chain(&err))?
                .into_iter()
                .map(|transfer| transfer.path().to_string())
                .collect();
            let affected = stores_dir
                .groups_affected_by(&group)
                .await
                .map_err(|err| error_chain(&err))?;
            let stores: Vec<StoreKey> = std::iter::once(group)
                .chain(affected.into_iter().map(|affected| affected.key))
                .collect();
            clear_all(nfc.as_ref(), &stores, &paths).await;
            Ok(())
        })
    }

    fn spawn_bounded<F>(&self, kind: &'static str, task: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = Result<(), String>> + Send + 'static,
    {
        let deadline = self.deadline;
        let metrics = self.metrics.clone();
        tokio::spawn(
            async move {
                let outcome = match tokio::time::timeout(deadline, task).await {
                    Ok(Ok(())) => "completed",
                    Ok(Err(reason)) => {
                        warn!(kind, error = %reason, "negative-cache invalidation failed");
                        "failed"
                    }
                    Err(_) => {
                        warn!(kind, deadline_secs = deadline.as_secs(), "negative-cache invalidation timed out");
                        "timed_out"
                    }
                };
                metrics.inc_nfc_invalidation(outcome);
            }
            .instrument(Span::current()),
        )
    }
}

async fn clear_all(nfc: &dyn NotFoundCache, stores: &[StoreKey], paths: &BTreeSet<String>) {
    for store in stores {
        for path in paths {
            nfc.clear_missing(&ConcreteResource::new(store.clone(), path.clone()))
                .await;
        }
    }
    info!(
        stores = stores.len(),
        paths = paths.len(),
        "cleared negative-cache entries"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use depot_core::HostedRepository;
    use depot_test_support::{MemoryContent, MemoryStores, RecordingNfc};

    struct StalledNfc;

    #[async_trait]
    impl NotFoundCache for StalledNfc {
        async fn clear_missing(&self, _resource: &ConcreteResource) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    fn invalidator(
        nfc: Arc<dyn NotFoundCache>,
        stores: Arc<MemoryStores>,
        deadline: Duration,
    ) -> anyhow::Result<NfcInvalidator> {
        Ok(NfcInvalidator::new(
            nfc,
            stores,
            Arc::new(MemoryContent::new()),
            deadline,
            Metrics::new()?,
        ))
    }

    #[tokio::test]
    async fn clears_target_and_affected_groups() -> anyhow::Result<()> {
        let nfc = Arc::new(RecordingNfc::new());
        let target = StoreKey::hosted("maven", "releases");
        let group = Group::new("maven", "public", vec![target.clone()]);
        let invalidator = invalidator(
            nfc.clone(),
            Arc::new(MemoryStores::new()),
            Duration::from_secs(5),
        )?;

        invalidator
            .schedule_paths(
                target.clone(),
                BTreeSet::from(["a.jar".to_string(), "a.pom".to_string()]),
                vec![group.clone()],
            )
            .await?;

        assert_eq!(nfc.cleared().len(), 4);
        assert!(nfc.was_cleared(&target, "a.pom"));
        assert!(nfc.was_cleared(&group.key, "a.jar"));
        Ok(())
    }

    #[tokio::test]
    async fn group_member_paths_are_listed_from_the_member() -> anyhow::Result<()> {
        let nfc = Arc::new(RecordingNfc::new());
        let stores = Arc::new(MemoryStores::new());
        let member = StoreKey::hosted("npm", "staging");
        let inner = Group::new("npm", "inner", vec![member.clone()]);
        let outer = Group::new("npm", "outer", vec![inner.key.clone()]);
        stores.insert(HostedRepository::new("npm", "staging"));
        stores.insert(inner.clone());
        stores.insert(outer.clone());
        let content = Arc::new(MemoryContent::new());
        content.put(&member, "left-pad/-/left-pad-1.0.0.tgz", "tgz");
        let invalidator = NfcInvalidator::new(
            nfc.clone(),
            stores,
            content,
            Duration::from_secs(5),
            Metrics::new()?,
        );

        invalidator
            .schedule_group_member(inner.key.clone(), member)
            .await?;

        assert!(nfc.was_cleared(&inner.key, "left-pad/-/left-pad-1.0.0.tgz"));
        assert!(nfc.was_cleared(&outer.key, "left-pad/-/left-pad-1.0.0.tgz"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_cache_is_abandoned_at_the_deadline() -> anyhow::Result<()> {
        let invalidator = invalidator(
            Arc::new(StalledNfc),
            Arc::new(MemoryStores::new()),
            Duration::from_secs(1),
        )?;

        let started = tokio::time::Instant::now();
        invalidator
            .schedule_paths(
                StoreKey::hosted("maven", "releases"),
                BTreeSet::from(["a.jar".to_string()]),
                Vec::new(),
            )
            .await?;

        assert!(started.elapsed() < Duration::from_secs(60));
        Ok(())
    }
}
