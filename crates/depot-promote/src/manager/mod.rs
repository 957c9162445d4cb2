//! Promotion orchestrator.
//!
//! # Design
//! - One execution function per promotion kind; synchronous and asynchronous
//!   callers share it and differ only in whether they await the pool handle.
//! - Each execution is tracked by promotion id, counted in metrics and, when
//!   the request names a callback, delivered to it.
//! - Nothing escapes a promotion task: a panic is caught at the task boundary
//!   and reported as a failed result.
//! - Only pool rejection at submission surfaces as `Err`; every other failure
//!   is folded into the returned result.

mod group;
mod paths;

use std::future::Future;
use std::sync::Arc;

use depot_config::PromoteConfig;
use depot_core::{
    CallbackPayload, CallbackPoster, CallbackTarget, ContentAccess, ContentError,
    GroupPromoteRequest, GroupPromoteResult, NotFoundCache, PathsPromoteRequest,
    PathsPromoteResult, PromotionOutcome, PromotionValidator, SpecialPathClassifier,
    StoreDirectory, StoreKey, ValidationError, error_chain,
};
use depot_events::EventBus;
use depot_telemetry::Metrics;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::conflict::PathConflictManager;
use crate::error::{PromoteError, PromoteResult};
use crate::invalidator::NfcInvalidator;
use crate::lock::TargetLockRegistry;
use crate::pool::WorkerPool;
use crate::tracker::{PromotionRecord, PromotionTracker, TrackedPromotion};
use crate::transfer::TransferExecutor;

const DISABLED: &str = "promotion is disabled";

/// Collaborators the engine consumes.
pub struct PromotionDeps {
    /// Store definitions and group topology.
    pub stores: Arc<dyn StoreDirectory>,
    /// Path-level content access.
    pub content: Arc<dyn ContentAccess>,
    /// Special-path classification.
    pub classifier: Arc<dyn SpecialPathClassifier>,
    /// Validation rule runner.
    pub validator: Arc<dyn PromotionValidator>,
    /// Negative cache.
    pub nfc: Arc<dyn NotFoundCache>,
    /// Result delivery for requests that name a callback.
    pub callbacks: Arc<dyn CallbackPoster>,
    /// Domain event bus.
    pub events: EventBus,
    /// Metrics registry.
    pub metrics: Metrics,
}

/// Failure of an engine step that is reported inside a result.
#[derive(Debug, Error)]
enum StepError {
    #[error("content access failed")]
    Content(#[from] ContentError),
    #[error("validation could not run")]
    Validation(#[from] ValidationError),
}

impl StepError {
    fn render(&self) -> String {
        error_chain(self)
    }
}

/// Result types the dispatcher knows how to track, count and deliver.
trait Report: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn into_failure(self, error: String) -> Self;
    fn record(&self) -> PromotionRecord;
    fn payload(&self) -> CallbackPayload<'_>;
    fn terminal_outcome(&self) -> PromotionOutcome;
    fn count_paths(&self, _metrics: &Metrics) {}
}

impl Report for PathsPromoteResult {
    const KIND: &'static str = "paths";

    fn into_failure(self, error: String) -> Self {
        Self::failed(self.request, error)
    }

    fn record(&self) -> PromotionRecord {
        PromotionRecord::Paths(self.clone())
    }

    fn payload(&self) -> CallbackPayload<'_> {
        CallbackPayload::Paths(self)
    }

    fn terminal_outcome(&self) -> PromotionOutcome {
        self.outcome()
    }

    fn count_paths(&self, metrics: &Metrics) {
        if self.succeeded() {
            metrics.add_paths("completed", self.completed_paths.len());
            metrics.add_paths("skipped", self.skipped_paths.len());
        }
    }
}

impl Report for GroupPromoteResult {
    const KIND: &'static str = "group";

    fn into_failure(self, error: String) -> Self {
        Self::failed(self.request, error)
    }

    fn record(&self) -> PromotionRecord {
        PromotionRecord::Group(self.clone())
    }

    fn payload(&self) -> CallbackPayload<'_> {
        CallbackPayload::Group(self)
    }

    fn terminal_outcome(&self) -> PromotionOutcome {
        self.outcome()
    }
}

/// Per-execution bookkeeping shared by every promotion kind.
#[derive(Debug, Clone)]
struct Ticket {
    promotion_id: String,
    run_async: bool,
    rollback: bool,
    callback: Option<CallbackTarget>,
    source: StoreKey,
    target: StoreKey,
}

impl Ticket {
    fn paths(request: &PathsPromoteRequest, rollback: bool) -> Self {
        Self {
            promotion_id: request.promotion_id.clone(),
            run_async: request.run_async,
            rollback,
            callback: request.callback.clone(),
            source: request.source.clone(),
            target: request.target.clone(),
        }
    }

    fn group(request: &GroupPromoteRequest, rollback: bool) -> Self {
        Self {
            promotion_id: request.promotion_id.clone(),
            run_async: request.run_async,
            rollback,
            callback: request.callback.clone(),
            source: request.source.clone(),
            target: request.target_key(),
        }
    }
}

struct Engine {
    config: PromoteConfig,
    stores: Arc<dyn StoreDirectory>,
    content: Arc<dyn ContentAccess>,
    validator: Arc<dyn PromotionValidator>,
    callbacks: Arc<dyn CallbackPoster>,
    events: EventBus,
    metrics: Metrics,
    pool: WorkerPool,
    transfers: TransferExecutor,
    invalidator: NfcInvalidator,
    locks: TargetLockRegistry,
    conflicts: PathConflictManager,
    tracker: PromotionTracker,
}

impl Engine {
    /// Record a terminal result: metrics, tracker, then callback delivery.
    async fn complete<R: Report>(&self, ticket: &Ticket, result: &R) {
        let outcome = result.terminal_outcome();
        if ticket.rollback {
            self.metrics.inc_rollback(R::KIND);
        } else {
            self.metrics.inc_promotion(R::KIND, outcome.as_str());
            result.count_paths(&self.metrics);
        }
        self.tracker.finish(&ticket.promotion_id, result.record());
        info!(outcome = outcome.as_str(), "promotion finished");

        if let Some(callback) = &ticket.callback
            && let Err(err) = self.callbacks.deliver(callback, result.payload()).await
        {
            warn!(
                url = %callback.url,
                error = %error_chain(&err),
                "promotion callback delivery failed"
            );
        }
    }

    /// Record a result produced without running a task.
    fn reject<R: Report>(&self, ticket: &Ticket, result: R) -> R {
        if ticket.rollback {
            self.metrics.inc_rollback(R::KIND);
        } else {
            self.metrics.inc_promotion(R::KIND, result.terminal_outcome().as_str());
        }
        self.tracker.finish(&ticket.promotion_id, result.record());
        result
    }
}

/// Entry point for path and group promotions and their rollbacks.
#[derive(Clone)]
pub struct PromotionManager {
    engine: Arc<Engine>,
}

impl PromotionManager {
    /// Build a manager over `deps` with both worker pools sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::Config`] when `config` fails validation.
    pub fn new(deps: PromotionDeps, config: PromoteConfig) -> PromoteResult<Self> {
        config
            .validate()
            .map_err(|source| PromoteError::Config { source })?;

        let pool = WorkerPool::new("promotion", &config.promotion_pool);
        let transfer_pool = WorkerPool::new("transfer", &config.transfer_pool);
        let transfers = TransferExecutor::new(
            Arc::clone(&deps.content),
            deps.classifier,
            transfer_pool,
            deps.metrics.clone(),
        );
        let invalidator = NfcInvalidator::new(
            deps.nfc,
            Arc::clone(&deps.stores),
            Arc::clone(&deps.content),
            config.nfc_clear_timeout(),
            deps.metrics.clone(),
        );
        let tracker = PromotionTracker::new(config.tracker_capacity);

        Ok(Self {
            engine: Arc::new(Engine {
                config,
                stores: deps.stores,
                content: deps.content,
                validator: deps.validator,
                callbacks: deps.callbacks,
                events: deps.events,
                metrics: deps.metrics,
                pool,
                transfers,
                invalidator,
                locks: TargetLockRegistry::new(),
                conflicts: PathConflictManager::new(),
                tracker,
            }),
        })
    }

    /// Add `request.source` to the membership of the requested group.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when the promotion pool
    /// rejects the request.
    pub async fn promote_to_group(
        &self,
        request: GroupPromoteRequest,
        user: &str,
        base_url: Option<&str>,
    ) -> PromoteResult<GroupPromoteResult> {
        let ticket = Ticket::group(&request, false);
        if !self.engine.config.enabled {
            return Ok(self
                .engine
                .reject(&ticket, GroupPromoteResult::failed(request, DISABLED)));
        }
        if let Some(message) = self.engine.check_group_promotion(&request).await {
            warn!(promotion_id = %ticket.promotion_id, error = %message, "group promotion rejected");
            return Ok(self
                .engine
                .reject(&ticket, GroupPromoteResult::failed(request, message)));
        }

        let engine = Arc::clone(&self.engine);
        let user = user.to_string();
        let base_url = base_url.map(str::to_string);
        let accepted = GroupPromoteResult::accepted(request.clone());
        self.dispatch(ticket, accepted, async move {
            engine
                .promote_group(request, &user, base_url.as_deref())
                .await
        })
        .await
    }

    /// Remove the source of a previous group promotion from the group.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when the promotion pool
    /// rejects the request.
    pub async fn rollback_group_promote(
        &self,
        result: GroupPromoteResult,
        user: &str,
    ) -> PromoteResult<GroupPromoteResult> {
        let ticket = Ticket::group(&result.request, true);
        if !self.engine.config.enabled {
            return Ok(self
                .engine
                .reject(&ticket, GroupPromoteResult::failed(result.request, DISABLED)));
        }
        if let Some(message) = self.engine.check_group_rollback(&result.request).await {
            warn!(promotion_id = %ticket.promotion_id, error = %message, "group rollback rejected");
            return Ok(self
                .engine
                .reject(&ticket, GroupPromoteResult::failed(result.request, message)));
        }

        let engine = Arc::clone(&self.engine);
        let user = user.to_string();
        let accepted = GroupPromoteResult::accepted(result.request.clone());
        self.dispatch(ticket, accepted, async move {
            engine.rollback_group(result.request, &user).await
        })
        .await
    }

    /// Copy the requested paths from the source store into the target store.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when the promotion pool
    /// rejects the request.
    pub async fn promote_paths(
        &self,
        request: PathsPromoteRequest,
        base_url: Option<&str>,
    ) -> PromoteResult<PathsPromoteResult> {
        let ticket = Ticket::paths(&request, false);
        if !self.engine.config.enabled {
            return Ok(self
                .engine
                .reject(&ticket, PathsPromoteResult::failed(request, DISABLED)));
        }

        let engine = Arc::clone(&self.engine);
        let base_url = base_url.map(str::to_string);
        let accepted = PathsPromoteResult::accepted(request.clone());
        self.dispatch(ticket, accepted, async move {
            engine
                .promote_paths(request, false, base_url.as_deref())
                .await
        })
        .await
    }

    /// Undo a previous path promotion by promoting its completed paths back.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::PoolOverloaded`] when the promotion pool
    /// rejects the request.
    pub async fn rollback_paths_promote(
        &self,
        result: PathsPromoteResult,
    ) -> PromoteResult<PathsPromoteResult> {
        let ticket = Ticket::paths(&result.request, true);
        if !self.engine.config.enabled {
            return Ok(self
                .engine
                .reject(&ticket, PathsPromoteResult::failed(result.request, DISABLED)));
        }

        let engine = Arc::clone(&self.engine);
        let accepted = PathsPromoteResult::accepted(result.request.clone());
        self.dispatch(ticket, accepted, async move { engine.rollback_paths(result).await })
            .await
    }

    /// Latest known state of `promotion_id`.
    #[must_use]
    pub fn status(&self, promotion_id: &str) -> Option<TrackedPromotion> {
        self.engine.tracker.get(promotion_id)
    }

    async fn dispatch<R, F>(&self, ticket: Ticket, accepted: R, job: F) -> PromoteResult<R>
    where
        R: Report,
        F: Future<Output = R> + Send + 'static,
    {
        let span = info_span!(
            "promotion",
            promotion_id = %ticket.promotion_id,
            kind = R::KIND,
            source = %ticket.source,
            target = %ticket.target,
        );
        let promotion_id = ticket.promotion_id.clone();
        let run_async = ticket.run_async;
        let engine = Arc::clone(&self.engine);
        let fallback = accepted.clone();

        self.engine.tracker.begin(&promotion_id);
        let task = async move {
            engine.metrics.promotion_started();
            let result = match tokio::spawn(job.in_current_span()).await {
                Ok(result) => result,
                Err(join_err) => {
                    error!(error = %join_err, "promotion task aborted");
                    fallback.into_failure(format!(
                        "Promotion of: {} to: {} aborted: {join_err}",
                        ticket.source, ticket.target
                    ))
                }
            };
            engine.metrics.promotion_finished();
            engine.complete(&ticket, &result).await;
            result
        }
        .instrument(span);

        let handle = match self.engine.pool.spawn(task) {
            Ok(handle) => handle,
            Err(err) => {
                self.engine.metrics.inc_pool_rejection(self.engine.pool.name());
                let failed = accepted.into_failure(error_chain(&err));
                self.engine.tracker.finish(&promotion_id, failed.record());
                return Err(err);
            }
        };

        if run_async {
            return Ok(accepted);
        }
        match handle.await {
            Ok(result) => Ok(result),
            Err(join_err) => {
                error!(promotion_id = %promotion_id, error = %join_err, "promotion worker aborted");
                let failed = accepted.into_failure(format!("Promotion worker aborted: {join_err}"));
                self.engine.tracker.finish(&promotion_id, failed.record());
                Ok(failed)
            }
        }
    }
}
