mod common;

use std::time::Duration;

use anyhow::Result;
use common::{Harness, WAIT, releases, staging};
use depot_config::{PoolConfig, PromoteConfig};
use depot_core::{
    CallbackTarget, GroupPromoteRequest, PathsPromoteRequest, PromotionOutcome, StoreKey,
};
use depot_events::Event;
use depot_promote::{PromoteError, TrackingState};
use depot_test_support::{ScriptedValidator, eventually};
use tokio_stream::StreamExt;

const JAR: &str = "org/acme/widget/1.0/widget-1.0.jar";
const HOOK: &str = "http://hooks.example.test/promotions";

fn finished(harness: &Harness, promotion_id: &str) -> Option<PromotionOutcome> {
    match harness.manager.status(promotion_id)?.state {
        TrackingState::Finished { record } => Some(record.outcome()),
        TrackingState::InProgress => None,
    }
}

#[tokio::test]
async fn async_paths_promotion_is_tracked_and_called_back() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed(&staging(), &[JAR]);
    let mut stream = harness.events.subscribe(None);
    let request = PathsPromoteRequest::new(staging(), releases())
        .with_async(true)
        .with_fire_events(true)
        .with_callback(CallbackTarget::post(HOOK))
        .with_promotion_id("async-1");

    let accepted = harness.manager.promote_paths(request, None).await?;
    assert_eq!(accepted.outcome(), PromotionOutcome::Accepted);
    assert!(accepted.completed_paths.is_empty());
    assert!(harness.manager.status("async-1").is_some());

    let callbacks = harness.callbacks.clone();
    eventually(WAIT, move || callbacks.delivered().len() == 1).await?;
    assert_eq!(finished(&harness, "async-1"), Some(PromotionOutcome::Succeeded));

    let (target, body) = harness
        .callbacks
        .delivered()
        .pop()
        .ok_or_else(|| anyhow::anyhow!("callback missing"))?;
    assert_eq!(target.url, HOOK);
    assert_eq!(body["request"]["promotion_id"], "async-1");
    assert_eq!(body["completed_paths"], serde_json::json!([JAR]));
    assert_eq!(body["accepted"], false);
    assert!(harness.content.contains(&releases(), JAR));

    let envelope = tokio::time::timeout(WAIT, stream.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("event stream closed"))?;
    assert!(matches!(
        envelope.event,
        Event::PathsPromoted { ref promotion_id, .. } if promotion_id == "async-1"
    ));
    Ok(())
}

#[tokio::test]
async fn sync_group_promotion_delivers_callback() -> Result<()> {
    let harness = Harness::new()?;
    let request = GroupPromoteRequest::new(staging(), "public")
        .with_callback(CallbackTarget::post(HOOK));

    let result = harness
        .manager
        .promote_to_group(request.clone(), "alice", None)
        .await?;

    assert!(result.succeeded());
    assert_eq!(
        finished(&harness, &request.promotion_id),
        Some(PromotionOutcome::Succeeded)
    );
    let delivered = harness.callbacks.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1["request"]["target_group"], "public");
    Ok(())
}

#[tokio::test]
async fn async_group_request_failing_prechecks_is_answered_immediately() -> Result<()> {
    let harness = Harness::new()?;
    let ghost = StoreKey::hosted(common::MAVEN, "ghost");
    let request = GroupPromoteRequest::new(ghost, "public").with_async(true);

    let result = harness
        .manager
        .promote_to_group(request.clone(), "alice", None)
        .await?;

    assert_eq!(result.outcome(), PromotionOutcome::Failed);
    assert_eq!(
        finished(&harness, &request.promotion_id),
        Some(PromotionOutcome::Failed)
    );
    Ok(())
}

#[tokio::test]
async fn disabled_engine_fails_every_request() -> Result<()> {
    let config = PromoteConfig {
        enabled: false,
        ..PromoteConfig::default()
    };
    let harness = Harness::with(ScriptedValidator::passing(), config)?;
    harness.seed(&staging(), &[JAR]);

    let paths = harness
        .manager
        .promote_paths(PathsPromoteRequest::new(staging(), releases()), None)
        .await?;
    let group = harness
        .manager
        .promote_to_group(GroupPromoteRequest::new(staging(), "public"), "alice", None)
        .await?;

    assert_eq!(paths.error.as_deref(), Some("promotion is disabled"));
    assert_eq!(group.error.as_deref(), Some("promotion is disabled"));
    assert!(!harness.content.contains(&releases(), JAR));
    assert_eq!(harness.validator.calls(), 0);
    assert_eq!(harness.metrics.snapshot().promotions_failed, 2);
    assert!(harness.callbacks.delivered().is_empty());
    Ok(())
}

#[tokio::test]
async fn overloaded_pool_rejects_submission() -> Result<()> {
    let config = PromoteConfig {
        promotion_pool: PoolConfig {
            threads: 1,
            priority: 8,
            max_load_factor: 1,
        },
        ..PromoteConfig::default()
    };
    let harness = Harness::with(ScriptedValidator::passing(), config)?;
    harness.validator.set_delay(Duration::from_millis(500));
    harness.seed(&staging(), &[JAR]);

    let first = PathsPromoteRequest::new(staging(), releases())
        .with_async(true)
        .with_promotion_id("first");
    harness.manager.promote_paths(first, None).await?;

    let second = PathsPromoteRequest::new(staging(), releases()).with_promotion_id("second");
    match harness.manager.promote_paths(second, None).await {
        Err(PromoteError::PoolOverloaded { pool, limit, .. }) => {
            assert_eq!(pool, "promotion");
            assert_eq!(limit, 1);
        }
        other => panic!("expected overload, got {other:?}"),
    }
    assert_eq!(finished(&harness, "second"), Some(PromotionOutcome::Failed));
    assert_eq!(harness.metrics.snapshot().pool_rejections_total, 1);

    let manager = harness.manager.clone();
    eventually(WAIT, move || {
        manager
            .status("first")
            .is_some_and(|tracked| matches!(tracked.state, TrackingState::Finished { .. }))
    })
    .await?;
    assert_eq!(finished(&harness, "first"), Some(PromotionOutcome::Succeeded));
    Ok(())
}

#[tokio::test]
async fn panicking_sync_promotion_is_reported_as_failed() -> Result<()> {
    let harness = Harness::with(ScriptedValidator::panicking(), PromoteConfig::default())?;
    harness.seed(&staging(), &[JAR]);
    let request = PathsPromoteRequest::new(staging(), releases()).with_promotion_id("boom");

    let result = harness.manager.promote_paths(request, None).await?;

    assert_eq!(result.outcome(), PromotionOutcome::Failed);
    let error = result.error.clone().unwrap_or_default();
    assert!(
        error.starts_with(&format!("Promotion of: {} to: {} aborted: ", staging(), releases())),
        "{error}"
    );
    assert!(result.completed_paths.is_empty());
    assert!(!harness.content.contains(&releases(), JAR));
    assert_eq!(finished(&harness, "boom"), Some(PromotionOutcome::Failed));
    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.promotions_failed, 1);
    assert_eq!(snapshot.promotions_in_flight, 0);
    Ok(())
}

#[tokio::test]
async fn panicking_async_promotion_is_tracked_and_called_back() -> Result<()> {
    let harness = Harness::with(ScriptedValidator::panicking(), PromoteConfig::default())?;
    let request = GroupPromoteRequest::new(staging(), "public")
        .with_async(true)
        .with_callback(CallbackTarget::post(HOOK));
    let promotion_id = request.promotion_id.clone();

    let accepted = harness
        .manager
        .promote_to_group(request, "alice", None)
        .await?;
    assert_eq!(accepted.outcome(), PromotionOutcome::Accepted);

    let callbacks = harness.callbacks.clone();
    eventually(WAIT, move || callbacks.delivered().len() == 1).await?;
    assert_eq!(finished(&harness, &promotion_id), Some(PromotionOutcome::Failed));

    let (_, body) = harness
        .callbacks
        .delivered()
        .pop()
        .ok_or_else(|| anyhow::anyhow!("callback missing"))?;
    assert_eq!(body["accepted"], false);
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains(" aborted: "), "{error}");
    assert!(
        harness
            .stores
            .group(&common::public())
            .is_some_and(|group| !group.constituents.contains(&staging()))
    );
    Ok(())
}

#[tokio::test]
async fn invalid_config_is_refused() {
    let config = PromoteConfig {
        lock_timeout_seconds: 0,
        ..PromoteConfig::default()
    };
    match Harness::with(ScriptedValidator::passing(), config) {
        Ok(_) => panic!("zero lock timeout accepted"),
        Err(err) => assert!(
            matches!(err.downcast_ref::<PromoteError>(), Some(PromoteError::Config { .. })),
            "{err:?}"
        ),
    }
}

#[tokio::test]
async fn metrics_count_outcomes() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed(&staging(), &[JAR]);

    let promoted = harness
        .manager
        .promote_paths(PathsPromoteRequest::new(staging(), releases()), None)
        .await?;
    assert!(promoted.succeeded());
    let missing = harness
        .manager
        .promote_paths(
            PathsPromoteRequest::new(staging(), StoreKey::hosted(common::MAVEN, "ghost"))
                .with_paths([JAR]),
            None,
        )
        .await?;
    assert!(!missing.succeeded());
    harness.manager.rollback_paths_promote(promoted).await?;

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.promotions_succeeded, 1);
    assert_eq!(snapshot.promotions_failed, 1);
    assert_eq!(snapshot.rollbacks_total, 1);
    assert_eq!(snapshot.promotions_in_flight, 0);
    assert!(harness.manager.status("never-submitted").is_none());
    Ok(())
}
