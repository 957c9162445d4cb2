use depot_core::{
    ArtifactStore, ChangeSummary, Group, GroupPromoteRequest, GroupPromoteResult,
    PromoteRequestRef, StoreKey, StoreType, ValidationResult, error_chain,
};
use depot_events::Event;
use tracing::{debug, info, warn};

use super::{Engine, StepError};

impl Engine {
    /// Checks run before a group promotion is submitted.
    pub(super) async fn check_group_promotion(&self, request: &GroupPromoteRequest) -> Option<String> {
        if !request.source.is_concrete() {
            return Some(format!(
                "Cannot promote group store: {} into group membership; only concrete stores are allowed",
                request.source
            ));
        }
        match self.stores.exists(&request.source).await {
            Ok(true) => {}
            Ok(false) => {
                return Some(format!(
                    "Cannot promote from missing source: {}",
                    request.source
                ));
            }
            Err(err) => {
                return Some(format!(
                    "Cannot retrieve source store: {}. Reason: {}",
                    request.source,
                    error_chain(&err)
                ));
            }
        }
        self.check_target_group(&request.target_key()).await
    }

    /// Checks run before a group rollback is submitted.
    pub(super) async fn check_group_rollback(&self, request: &GroupPromoteRequest) -> Option<String> {
        match self.stores.exists(&request.source).await {
            Ok(true) => {}
            Ok(false) => {
                return Some(format!(
                    "No such source/member store: {}",
                    request.source
                ));
            }
            Err(err) => {
                return Some(format!(
                    "Cannot retrieve source/member store: {}. Reason: {}",
                    request.source,
                    error_chain(&err)
                ));
            }
        }
        self.check_target_group(&request.target_key()).await
    }

    async fn check_target_group(&self, target: &StoreKey) -> Option<String> {
        match self.stores.exists(target).await {
            Ok(true) => None,
            Ok(false) => Some(format!("No such target group: {target}.")),
            Err(err) => Some(format!(
                "Cannot retrieve target group: {target}. Reason: {}",
                error_chain(&err)
            )),
        }
    }

    pub(super) async fn promote_group(
        &self,
        request: GroupPromoteRequest,
        user: &str,
        base_url: Option<&str>,
    ) -> GroupPromoteResult {
        let target = request.target_key();
        let timeout = self.config.lock_timeout();
        let attempt = self
            .locks
            .lock_and(
                &target,
                timeout,
                || self.validate_and_promote(&request, &target, user, base_url),
                || {
                    Err(format!(
                        "Failed to acquire group promotion lock on target when promote: {target} in {} seconds.",
                        timeout.as_secs()
                    ))
                },
            )
            .await;

        match attempt {
            Ok(validations) => GroupPromoteResult::new(request).with_validations(validations),
            Err(reason) => {
                let message = format!(
                    "Group promotion failed. Target: {target}, Source: {}, Reason: {reason}",
                    request.source
                );
                warn!(error = %message, "group promotion failed");
                GroupPromoteResult::failed(request, message)
            }
        }
    }

    pub(super) async fn rollback_group(
        &self,
        request: GroupPromoteRequest,
        user: &str,
    ) -> GroupPromoteResult {
        let target = request.target_key();
        let timeout = self.config.lock_timeout();
        let attempt = self
            .locks
            .lock_and(
                &target,
                timeout,
                || self.remove_member(&request, &target, user),
                || {
                    Err(format!(
                        "Failed to acquire group promotion lock on target when rolling back: {target} in {} seconds.",
                        timeout.as_secs()
                    ))
                },
            )
            .await;

        match attempt {
            Ok(None) => GroupPromoteResult::new(request),
            Ok(Some(refusal)) => {
                info!(reason = %refusal, "nothing to roll back");
                GroupPromoteResult::failed(request, refusal)
            }
            Err(reason) => {
                let message = format!(
                    "Group promotion rollback failed. Target: {target}, Source: {}, Reason: {reason}",
                    request.source
                );
                warn!(error = %message, "group rollback failed");
                GroupPromoteResult::failed(request, message)
            }
        }
    }

    async fn fetch_group(&self, target: &StoreKey) -> Result<Group, String> {
        match self.stores.get(target).await {
            Ok(Some(store)) => store
                .into_group()
                .ok_or_else(|| format!("Cannot retrieve target group: {target}. Reason: not a group")),
            Ok(None) => Err(format!("No such target group: {target}.")),
            Err(err) => Err(format!(
                "Cannot retrieve target group: {target}. Reason: {}",
                error_chain(&err)
            )),
        }
    }

    async fn validate_and_promote(
        &self,
        request: &GroupPromoteRequest,
        target: &StoreKey,
        user: &str,
        base_url: Option<&str>,
    ) -> Result<ValidationResult, String> {
        let mut group = self.fetch_group(target).await?;
        let validations = self
            .validator
            .validate(PromoteRequestRef::Group(request), base_url)
            .await
            .map_err(|err| StepError::from(err).render())?;

        if !validations.is_valid() {
            info!(rules = ?validations.errors().keys().collect::<Vec<_>>(), "group promotion failed validation");
            return Ok(validations);
        }
        if request.dry_run {
            debug!("dry run, group left unchanged");
            return Ok(validations);
        }
        if !group.add_constituent(request.source.clone()) {
            debug!("source already a member of the target group");
            return Ok(validations);
        }

        let summary = ChangeSummary::new(
            user,
            format!(
                "Promoting {} into membership of group: {target}",
                request.source
            ),
        );
        self.stores
            .persist(ArtifactStore::from(group), &summary)
            .await
            .map_err(|err| {
                format!(
                    "Failed to store group: {target} with additional member: {}. Reason: {}",
                    request.source,
                    error_chain(&err)
                )
            })?;
        info!("source added to group membership");
        self.events.publish(Event::GroupMemberAdded {
            promotion_id: request.promotion_id.clone(),
            group: target.clone(),
            member: request.source.clone(),
        });
        drop(
            self.invalidator
                .schedule_group_member(target.clone(), request.source.clone()),
        );

        if request.source.store_type == StoreType::Hosted && self.config.autolock_hosted_repos {
            self.lock_source(&request.source, &summary).await?;
        }
        Ok(validations)
    }

    async fn lock_source(&self, source: &StoreKey, summary: &ChangeSummary) -> Result<(), String> {
        let hosted = self
            .stores
            .get(source)
            .await
            .map_err(|err| {
                format!(
                    "Cannot retrieve source store: {source}. Reason: {}",
                    error_chain(&err)
                )
            })?
            .and_then(ArtifactStore::into_hosted);
        let Some(mut hosted) = hosted else {
            warn!(source_store = %source, "hosted source disappeared before it could be locked");
            return Ok(());
        };
        if hosted.readonly {
            return Ok(());
        }

        hosted.readonly = true;
        self.stores
            .persist(ArtifactStore::from(hosted), summary)
            .await
            .map_err(|err| {
                format!(
                    "Failed to store source: {source} as read-only. Reason: {}",
                    error_chain(&err)
                )
            })?;
        info!(source_store = %source, "hosted source marked read-only");
        self.events.publish(Event::StoreLocked {
            store: source.clone(),
        });
        Ok(())
    }

    /// `Ok(Some(reason))` when the source is not a member.
    async fn remove_member(
        &self,
        request: &GroupPromoteRequest,
        target: &StoreKey,
        user: &str,
    ) -> Result<Option<String>, String> {
        let mut group = self.fetch_group(target).await?;
        if !group.remove_constituent(&request.source) {
            return Ok(Some(format!(
                "Group: {target} does not contain member: {}",
                request.source
            )));
        }

        let summary = ChangeSummary::new(
            user,
            format!(
                "Removing {} from membership of group: {target}",
                request.source
            ),
        );
        self.stores
            .persist(ArtifactStore::from(group), &summary)
            .await
            .map_err(|err| {
                format!(
                    "Failed to store group: {target} without member: {}. Reason: {}",
                    request.source,
                    error_chain(&err)
                )
            })?;
        info!("source removed from group membership");
        self.events.publish(Event::GroupMemberRemoved {
            promotion_id: request.promotion_id.clone(),
            group: target.clone(),
            member: request.source.clone(),
        });
        Ok(None)
    }
}
