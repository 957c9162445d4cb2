//! Parallel per-path transfer phase with compensating rollback.

use std::collections::BTreeSet;
use std::sync::Arc;

use depot_core::{
    ContentAccess, PathTransferResult, PathTransferStatus, PathsPromoteRequest,
    SpecialPathClassifier, StoreKey, Transfer, error_chain,
};
use depot_telemetry::Metrics;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::batcher::{batch, parallel_batch_size};
use crate::pool::WorkerPool;

/// Aggregated outcome of one transfer phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Paths copied into the target; empty after a failed phase.
    pub completed: BTreeSet<String>,
    /// Paths that needed no copy.
    pub skipped: BTreeSet<String>,
    /// Every error observed, including compensating-delete failures.
    pub errors: Vec<String>,
}

impl TransferOutcome {
    /// Whether the phase finished without any error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

struct TransferContext {
    content: Arc<dyn ContentAccess>,
    classifier: Arc<dyn SpecialPathClassifier>,
    source: StoreKey,
    target: StoreKey,
    package_type: String,
    fail_when_exists: bool,
}

/// Runs batched path transfers on the transfer pool.
#[derive(Clone)]
pub struct TransferExecutor {
    content: Arc<dyn ContentAccess>,
    classifier: Arc<dyn SpecialPathClassifier>,
    pool: WorkerPool,
    metrics: Metrics,
}

impl TransferExecutor {
    /// Build an executor over the given collaborators and pool.
    #[must_use]
    pub fn new(
        content: Arc<dyn ContentAccess>,
        classifier: Arc<dyn SpecialPathClassifier>,
        pool: WorkerPool,
        metrics: Metrics,
    ) -> Self {
        Self {
            content,
            classifier,
            pool,
            metrics,
        }
    }

    /// Transfer every entry of `transfers` from the request's source into its
    /// target.
    ///
    /// Any error fails the whole phase: completed paths are deleted from the
    /// target again before returning, and the outcome reports no completed
    /// paths.
    pub async fn run(
        &self,
        request: &PathsPromoteRequest,
        transfers: Vec<Transfer>,
    ) -> TransferOutcome {
        let context = Arc::new(TransferContext {
            content: Arc::clone(&self.content),
            classifier: Arc::clone(&self.classifier),
            source: request.source.clone(),
            target: request.target.clone(),
            package_type: request.target.package_type.clone(),
            fail_when_exists: request.fail_when_exists,
        });

        let size = transfers.len();
        let batch_size = parallel_batch_size(size, self.pool.core_size());
        info!(size, batch_size, "executing parallel path transfers");

        let mut outcome = TransferOutcome::default();
        let mut jobs = JoinSet::new();
        for paths in batch(transfers, batch_size) {
            let context = Arc::clone(&context);
            if let Err(err) = self
                .pool
                .spawn_into(&mut jobs, run_batch(context, paths))
            {
                let message = format!(
                    "Failed to submit all path promotion jobs. Error: {}",
                    error_chain(&err)
                );
                error!(error = %message, "transfer submission rejected");
                self.metrics.inc_pool_rejection(self.pool.name());
                outcome.errors.push(message);
                break;
            }
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(results) => {
                    for result in results {
                        match result.status() {
                            PathTransferStatus::Completed => {
                                outcome.completed.insert(result.path);
                            }
                            PathTransferStatus::Skipped => {
                                outcome.skipped.insert(result.path);
                            }
                            PathTransferStatus::Failed => {
                                outcome.errors.extend(result.error);
                            }
                        }
                    }
                }
                Err(join_err) => {
                    let message = format!(
                        "Error waiting for promotion of: {} to: {}. {join_err}",
                        request.source, request.target
                    );
                    error!(error = %message, "transfer batch aborted");
                    outcome.errors.push(message);
                }
            }
        }

        if !outcome.succeeded() {
            let completed = std::mem::take(&mut outcome.completed);
            outcome.skipped.clear();
            let rollback_errors = self.delete_from_target(&request.target, &completed).await;
            outcome.errors.extend(rollback_errors);
        }
        outcome
    }

    /// Best-effort delete of `paths` from `target`; returns the failures.
    pub async fn delete_from_target(
        &self,
        target: &StoreKey,
        paths: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        for path in paths {
            if let Err(err) = self.content.delete(target, path).await {
                let message = format!(
                    "Failed to rollback path promotion, path: {path}, target: {target}. Error: {}",
                    error_chain(&err)
                );
                warn!(error = %message, "compensating delete failed");
                errors.push(message);
            }
        }
        if !paths.is_empty() {
            info!(target_store = %target, count = paths.len(), "rolled back completed paths");
        }
        errors
    }
}

async fn run_batch(context: Arc<TransferContext>, transfers: Vec<Transfer>) -> Vec<PathTransferResult> {
    let mut results = Vec::with_capacity(transfers.len());
    for transfer in transfers {
        results.push(do_path_transfer(&context, transfer).await);
    }
    results
}

async fn source_exists(context: &TransferContext, transfer: &Transfer) -> Result<bool, String> {
    context.content.exists(transfer).await.map_err(|err| {
        format!(
            "Failed to promote: {transfer}. Source check failed: {}",
            error_chain(&err)
        )
    })
}

async fn resolve_missing_source(
    context: &TransferContext,
    transfer: &Transfer,
) -> Result<Option<Transfer>, String> {
    if !context.content.is_remote_backed(transfer) {
        return Ok(None);
    }
    match context.content.redownload(transfer).await {
        Ok(Some(fetched)) => {
            let present = source_exists(context, &fetched).await?;
            Ok(present.then_some(fetched))
        }
        Ok(None) => Ok(None),
        Err(err) => {
            warn!(path = transfer.path(), error = %error_chain(&err), "re-download failed");
            Ok(None)
        }
    }
}

async fn do_path_transfer(context: &TransferContext, transfer: Transfer) -> PathTransferResult {
    let path = transfer.path().to_string();
    debug!(path = %path, target_store = %context.target, "path transfer");

    let source = match source_exists(context, &transfer).await {
        Ok(true) => transfer,
        Ok(false) => {
            let special = context.classifier.classify(&transfer, &context.package_type);
            if special.is_some_and(|info| !info.decoratable) {
                info!(path = %path, "skipping missing, non-decoratable path");
                return PathTransferResult::skipped(path);
            }
            match resolve_missing_source(context, &transfer).await {
                Ok(Some(fetched)) => fetched,
                Ok(None) => {
                    let message =
                        format!("Failed to promote: {transfer}. Source file not exists.");
                    info!(error = %message, "missing source");
                    return PathTransferResult::failed(path, message);
                }
                Err(message) => return PathTransferResult::failed(path, message),
            }
        }
        Err(message) => return PathTransferResult::failed(path, message),
    };

    let target = match context.content.open_for_write(&context.target, &path).await {
        Ok(target) => target,
        Err(err) => {
            return PathTransferResult::failed(
                path,
                format!(
                    "Failed to promote: {source}. Target: {}. Error: {}",
                    context.target,
                    error_chain(&err)
                ),
            );
        }
    };
    let target_exists = match context.content.exists(&target).await {
        Ok(exists) => exists,
        Err(err) => {
            return PathTransferResult::failed(
                path,
                format!(
                    "Failed to promote: {source}. Target: {}. Error: {}",
                    context.target,
                    error_chain(&err)
                ),
            );
        }
    };

    let special = context.classifier.classify(&target, &context.package_type);
    if special.is_some_and(|info| info.metadata) {
        if target_exists
            && let Err(err) = context.content.delete(&context.target, &path).await
        {
            let message = format!(
                "Failed to promote metadata: {source}. Target: {}. Error: {}",
                context.target,
                error_chain(&err)
            );
            error!(error = %message, "metadata removal failed");
            return PathTransferResult::failed(path, message);
        }
        info!(path = %path, "metadata marked as skipped");
        return PathTransferResult::skipped(path);
    }

    if target_exists {
        if context.fail_when_exists {
            let message = format!(
                "Failed to promote: {source}. Target: {}. Target file already exists.",
                context.target
            );
            info!(error = %message, "target exists");
            return PathTransferResult::failed(path, message);
        }
        return PathTransferResult::skipped(path);
    }

    let copied = match context.content.open_read(&source).await {
        Ok(stream) => context.content.write(&target, stream).await,
        Err(err) => Err(err),
    };
    match copied {
        Ok(bytes) => {
            debug!(
                path = %path,
                bytes,
                source_store = %context.source,
                target_store = %context.target,
                "path promoted"
            );
            PathTransferResult::completed(path)
        }
        Err(err) => {
            let message = format!("Failed to promote: {source}. Error: {}", error_chain(&err));
            error!(error = %message, "content copy failed");
            PathTransferResult::failed(path, message)
        }
    }
}
