use std::collections::BTreeSet;
use std::time::Instant;

use depot_core::{
    PathsPromoteRequest, PathsPromoteResult, PromoteRequestRef, StoreKey, Transfer,
    ValidationResult, error_chain,
};
use depot_events::Event;
use tracing::{info, warn};

use super::{Engine, StepError};

const ROOT_PATH: &str = "/";

fn failed_with_pending(
    request: &PathsPromoteRequest,
    pending: &BTreeSet<String>,
    validations: Option<&ValidationResult>,
    message: String,
) -> PathsPromoteResult {
    let result = PathsPromoteResult::failed(request.clone(), message).with_pending(pending.clone());
    match validations {
        Some(validations) => result.with_validations(validations.clone()),
        None => result,
    }
}

impl Engine {
    pub(super) async fn promote_paths(
        &self,
        request: PathsPromoteRequest,
        skip_validation: bool,
        base_url: Option<&str>,
    ) -> PathsPromoteResult {
        match self
            .do_paths_promotion(&request, skip_validation, base_url)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                let message = format!(
                    "Path promotion failed. Target: {}, Source: {}, Reason: {}",
                    request.target,
                    request.source,
                    err.render()
                );
                warn!(error = %message, "path promotion failed");
                PathsPromoteResult::failed(request, message)
            }
        }
    }

    pub(super) async fn rollback_paths(&self, mut result: PathsPromoteResult) -> PathsPromoteResult {
        result.accepted = false;
        if result.completed_paths.is_empty() {
            info!("nothing to roll back, completed set is empty");
            result.error = None;
            result.validations = None;
            return result;
        }

        let inverse = result.request.reversed(result.completed_paths.clone());
        match self.do_paths_promotion(&inverse, true, None).await {
            Ok(reverted) if reverted.succeeded() => {
                let paths = std::mem::take(&mut result.completed_paths);
                result.skipped_paths.clear();
                result.error = None;
                result.rolled_back = true;
                self.events.publish(Event::PathsRolledBack {
                    promotion_id: result.request.promotion_id.clone(),
                    source: result.request.source.clone(),
                    target: result.request.target.clone(),
                    paths: paths.iter().cloned().collect(),
                });
                info!(count = paths.len(), "path promotion rolled back");
                result.pending_paths = paths;
            }
            Ok(reverted) => {
                let message = reverted.error.unwrap_or_else(|| {
                    format!(
                        "Rollback path promotion failed. Target: {}, Source: {}, Reason: inverse promotion incomplete",
                        result.request.target, result.request.source
                    )
                });
                warn!(error = %message, "path rollback failed");
                result.error = Some(message);
            }
            Err(err) => {
                let message = format!(
                    "Rollback path promotion failed. Target: {}, Source: {}, Reason: {}",
                    result.request.target,
                    result.request.source,
                    err.render()
                );
                warn!(error = %message, "path rollback failed");
                result.error = Some(message);
            }
        }
        result
    }

    async fn do_paths_promotion(
        &self,
        request: &PathsPromoteRequest,
        skip_validation: bool,
        base_url: Option<&str>,
    ) -> Result<PathsPromoteResult, StepError> {
        let transfers = if request.paths.is_empty() {
            self.content
                .list_recursively(&request.source, ROOT_PATH)
                .await?
        } else {
            self.content
                .resolve_transfers(&request.source, &request.paths)
                .await?
        };
        let pending: BTreeSet<String> = transfers
            .iter()
            .map(|transfer| transfer.path().to_string())
            .collect();
        info!(size = pending.len(), "paths promotion");

        if pending.is_empty() {
            return Ok(PathsPromoteResult::new(request.clone()));
        }

        let result = if request.fail_when_exists {
            self.conflicts
                .check_and(
                    &request.target,
                    &pending,
                    || self.validate_and_transfer(request, skip_validation, base_url, &pending, transfers),
                    || {
                        let message = format!(
                            "Conflict detected, store: {}, paths: {pending:?}",
                            request.target
                        );
                        warn!(error = %message, "path promotion conflict");
                        Ok(failed_with_pending(request, &pending, None, message))
                    },
                )
                .await?
        } else {
            self.validate_and_transfer(request, skip_validation, base_url, &pending, transfers)
                .await?
        };

        if result.succeeded() && request.purge_source {
            self.purge_source_quietly(&request.source, &pending).await;
        }
        Ok(result)
    }

    async fn validate_and_transfer(
        &self,
        request: &PathsPromoteRequest,
        skip_validation: bool,
        base_url: Option<&str>,
        pending: &BTreeSet<String>,
        transfers: Vec<Transfer>,
    ) -> Result<PathsPromoteResult, StepError> {
        let validations = if skip_validation {
            ValidationResult::new()
        } else {
            self.validator
                .validate(PromoteRequestRef::Paths(request), base_url)
                .await?
        };

        if !validations.is_valid() {
            info!(rules = ?validations.errors().keys().collect::<Vec<_>>(), "path promotion failed validation");
            return Ok(PathsPromoteResult::new(request.clone())
                .with_pending(pending.clone())
                .with_validations(validations));
        }
        if request.dry_run {
            info!(size = pending.len(), "dry run, nothing transferred");
            return Ok(PathsPromoteResult::new(request.clone())
                .with_pending(pending.clone())
                .with_validations(validations));
        }

        let result = self
            .run_path_promotions(request, pending, transfers, validations)
            .await;
        if let Some(error) = &result.error {
            info!(error = %error, "path promotion failed");
        }
        Ok(result)
    }

    async fn run_path_promotions(
        &self,
        request: &PathsPromoteRequest,
        pending: &BTreeSet<String>,
        transfers: Vec<Transfer>,
        validations: ValidationResult,
    ) -> PathsPromoteResult {
        let started = Instant::now();

        if let Err(message) = self.check_stores(request).await {
            return failed_with_pending(request, pending, Some(&validations), message);
        }

        let affected = match self.stores.groups_affected_by(&request.target).await {
            Ok(groups) => groups,
            Err(err) => {
                let message = format!("Get affected groups failed, {}", error_chain(&err));
                warn!(error = %message, "affected group lookup failed");
                return failed_with_pending(request, pending, Some(&validations), message);
            }
        };
        info!(affected_groups = affected.len(), "calculated affected groups");

        let outcome = self.transfers.run(request, transfers).await;
        let result = if outcome.succeeded() {
            let mut result = PathsPromoteResult::new(request.clone())
                .with_pending(pending.clone())
                .with_validations(validations);
            result.completed_paths = outcome.completed;
            result.skipped_paths = outcome.skipped;

            drop(self.invalidator.schedule_paths(
                request.target.clone(),
                result.completed_paths.clone(),
                affected,
            ));
            if request.fire_events {
                self.events.publish(Event::PathsPromoted {
                    promotion_id: request.promotion_id.clone(),
                    source: request.source.clone(),
                    target: request.target.clone(),
                    paths: result.completed_paths.iter().cloned().collect(),
                });
            }
            result
        } else {
            failed_with_pending(request, pending, Some(&validations), outcome.errors.join("\n"))
        };

        info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            completed = result.completed_paths.len(),
            skipped = result.skipped_paths.len(),
            "path promotion run finished"
        );
        result
    }

    async fn check_stores(&self, request: &PathsPromoteRequest) -> Result<(), String> {
        let mut errors = Vec::new();
        for (label, key) in [("source", &request.source), ("target", &request.target)] {
            match self.stores.exists(key).await {
                Ok(true) => {}
                Ok(false) => errors.push(format!("No such {label} store: {key}")),
                Err(err) => errors.push(format!(
                    "Failed to retrieve {label} store: {key}. Reason: {}",
                    error_chain(&err)
                )),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    async fn purge_source_quietly(&self, source: &StoreKey, paths: &BTreeSet<String>) {
        let mut purged = 0_usize;
        for path in paths {
            match self.content.delete(source, path).await {
                Ok(true) => purged += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(path = %path, source_store = %source, error = %error_chain(&err), "source purge failed");
                }
            }
        }
        info!(source_store = %source, purged, "purged promoted paths from source");
    }
}
