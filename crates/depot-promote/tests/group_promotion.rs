mod common;

use std::time::Duration;

use anyhow::Result;
use common::{Harness, MAVEN, WAIT, builds, everything, public, releases, staging};
use depot_config::PromoteConfig;
use depot_core::{GroupPromoteRequest, StoreKey};
use depot_events::Event;
use depot_test_support::{ScriptedValidator, eventually};

const JAR: &str = "org/acme/gadget/2.0/gadget-2.0.jar";

fn request() -> GroupPromoteRequest {
    GroupPromoteRequest::new(staging(), "public")
}

fn members(harness: &Harness) -> Vec<StoreKey> {
    harness
        .stores
        .group(&public())
        .map(|group| group.constituents)
        .unwrap_or_default()
}

#[tokio::test]
async fn source_joins_group_and_is_locked() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed(&staging(), &[JAR]);

    let result = harness
        .manager
        .promote_to_group(request(), "alice", None)
        .await?;

    assert!(result.succeeded(), "{:?}", result.error);
    assert_eq!(members(&harness), vec![releases(), staging()]);
    assert!(harness.stores.hosted(&staging()).is_some_and(|repo| repo.readonly));

    let changes = harness.stores.changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].user, "alice");
    assert_eq!(
        changes[0].summary,
        format!("Promoting {} into membership of group: {}", staging(), public())
    );

    let events = harness.events();
    assert!(events.contains(&Event::GroupMemberAdded {
        promotion_id: result.request.promotion_id.clone(),
        group: public(),
        member: staging(),
    }));
    assert!(events.contains(&Event::StoreLocked { store: staging() }));

    let nfc = harness.nfc.clone();
    eventually(WAIT, move || {
        nfc.was_cleared(&public(), JAR) && nfc.was_cleared(&everything(), JAR)
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn autolock_can_be_disabled() -> Result<()> {
    let config = PromoteConfig {
        autolock_hosted_repos: false,
        ..PromoteConfig::default()
    };
    let harness = Harness::with(ScriptedValidator::passing(), config)?;

    let result = harness
        .manager
        .promote_to_group(request(), "alice", None)
        .await?;

    assert!(result.succeeded());
    assert!(harness.stores.hosted(&staging()).is_some_and(|repo| !repo.readonly));
    assert_eq!(harness.stores.changes().len(), 1);
    Ok(())
}

#[tokio::test]
async fn existing_member_is_left_alone() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness
        .manager
        .promote_to_group(GroupPromoteRequest::new(releases(), "public"), "alice", None)
        .await?;

    assert!(result.succeeded());
    assert_eq!(members(&harness), vec![releases()]);
    assert!(harness.stores.changes().is_empty());
    Ok(())
}

#[tokio::test]
async fn dry_run_leaves_group_unchanged() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness
        .manager
        .promote_to_group(request().with_dry_run(true), "alice", None)
        .await?;

    assert!(result.succeeded());
    assert_eq!(harness.validator.calls(), 1);
    assert_eq!(members(&harness), vec![releases()]);
    assert!(harness.stores.changes().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_validation_leaves_group_unchanged() -> Result<()> {
    let harness = Harness::with(
        ScriptedValidator::failing("signed-artifacts", "unsigned jar"),
        PromoteConfig::default(),
    )?;

    let result = harness
        .manager
        .promote_to_group(request(), "alice", None)
        .await?;

    assert!(!result.succeeded());
    assert!(result.error.is_none());
    assert!(
        result
            .validations
            .is_some_and(|validations| validations.errors().contains_key("signed-artifacts"))
    );
    assert_eq!(members(&harness), vec![releases()]);
    Ok(())
}

#[tokio::test]
async fn missing_source_is_rejected_before_submission() -> Result<()> {
    let harness = Harness::new()?;
    let ghost = StoreKey::hosted(MAVEN, "ghost");

    let result = harness
        .manager
        .promote_to_group(GroupPromoteRequest::new(ghost.clone(), "public"), "alice", None)
        .await?;

    assert_eq!(
        result.error.as_deref(),
        Some(format!("Cannot promote from missing source: {ghost}").as_str())
    );
    assert_eq!(harness.validator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_target_group_is_rejected() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness
        .manager
        .promote_to_group(GroupPromoteRequest::new(staging(), "nowhere"), "alice", None)
        .await?;

    assert_eq!(
        result.error.as_deref(),
        Some(format!("No such target group: {}.", StoreKey::group(MAVEN, "nowhere")).as_str())
    );
    Ok(())
}

#[tokio::test]
async fn group_source_is_rejected() -> Result<()> {
    let harness = Harness::new()?;

    let result = harness
        .manager
        .promote_to_group(GroupPromoteRequest::new(public(), "everything"), "alice", None)
        .await?;

    let error = result.error.unwrap_or_default();
    assert!(error.starts_with("Cannot promote group store: "), "{error}");
    assert_eq!(
        harness.stores.group(&everything()).map(|group| group.constituents),
        Some(vec![public()])
    );
    Ok(())
}

#[tokio::test]
async fn persist_failure_is_reported() -> Result<()> {
    let harness = Harness::new()?;
    harness.stores.fail_persist(true);

    let result = harness
        .manager
        .promote_to_group(request(), "alice", None)
        .await?;

    let error = result.error.unwrap_or_default();
    assert!(error.starts_with("Group promotion failed. Target: "), "{error}");
    assert!(error.contains("Failed to store group"), "{error}");
    assert_eq!(members(&harness), vec![releases()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_timeout_fails_the_waiting_promotion() -> Result<()> {
    let config = PromoteConfig {
        lock_timeout_seconds: 1,
        ..PromoteConfig::default()
    };
    let harness = Harness::with(ScriptedValidator::passing(), config)?;
    harness.validator.set_delay(Duration::from_millis(1_500));

    let (first, second) = tokio::join!(
        harness.manager.promote_to_group(request(), "alice", None),
        harness
            .manager
            .promote_to_group(GroupPromoteRequest::new(builds(), "public"), "bob", None),
    );
    let results = [first?, second?];

    assert_eq!(results.iter().filter(|result| result.succeeded()).count(), 1);
    let error = results
        .iter()
        .find_map(|result| result.error.clone())
        .unwrap_or_default();
    assert!(
        error.contains("Failed to acquire group promotion lock on target when promote: "),
        "{error}"
    );
    assert!(error.contains("in 1 seconds."), "{error}");
    assert_eq!(members(&harness).len(), 2);
    Ok(())
}

#[tokio::test]
async fn rollback_removes_membership() -> Result<()> {
    let harness = Harness::new()?;
    let promoted = harness
        .manager
        .promote_to_group(request(), "alice", None)
        .await?;
    assert!(members(&harness).contains(&staging()));

    let rolled_back = harness
        .manager
        .rollback_group_promote(promoted.clone(), "alice")
        .await?;

    assert!(rolled_back.succeeded(), "{:?}", rolled_back.error);
    assert_eq!(members(&harness), vec![releases()]);
    assert!(harness.events().contains(&Event::GroupMemberRemoved {
        promotion_id: promoted.request.promotion_id.clone(),
        group: public(),
        member: staging(),
    }));
    let last_change = harness.stores.changes().pop().map(|change| change.summary);
    assert_eq!(
        last_change,
        Some(format!("Removing {} from membership of group: {}", staging(), public()))
    );

    let again = harness
        .manager
        .rollback_group_promote(promoted, "alice")
        .await?;
    assert_eq!(
        again.error.as_deref(),
        Some(format!("Group: {} does not contain member: {}", public(), staging()).as_str())
    );
    assert_eq!(harness.metrics.snapshot().rollbacks_total, 2);
    Ok(())
}

#[tokio::test]
async fn rollback_of_missing_member_store_is_rejected() -> Result<()> {
    let harness = Harness::new()?;
    let ghost = StoreKey::hosted(MAVEN, "ghost");
    let result = depot_core::GroupPromoteResult::new(GroupPromoteRequest::new(ghost.clone(), "public"));

    let rolled_back = harness.manager.rollback_group_promote(result, "alice").await?;

    assert_eq!(
        rolled_back.error.as_deref(),
        Some(format!("No such source/member store: {ghost}").as_str())
    );
    Ok(())
}
