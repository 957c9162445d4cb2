//! Bounded registry of promotion states, polled by promotion id.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use depot_core::{GroupPromoteResult, PathsPromoteResult, PromotionOutcome};
use serde::Serialize;

/// Terminal result of either promotion kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum PromotionRecord {
    /// Path promotion or rollback.
    Paths(PathsPromoteResult),
    /// Group promotion or rollback.
    Group(GroupPromoteResult),
}

impl PromotionRecord {
    /// Outcome of the wrapped result.
    #[must_use]
    pub fn outcome(&self) -> PromotionOutcome {
        match self {
            Self::Paths(result) => result.outcome(),
            Self::Group(result) => result.outcome(),
        }
    }
}

/// Execution state of a tracked promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackingState {
    /// Submitted and not finished yet.
    InProgress,
    /// Finished with the given result.
    Finished {
        /// Terminal result.
        record: PromotionRecord,
    },
}

/// Snapshot returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedPromotion {
    /// Correlation token.
    pub promotion_id: String,
    /// Current state.
    pub state: TrackingState,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TrackerState {
    entries: HashMap<String, TrackedPromotion>,
    order: VecDeque<String>,
}

/// Ring of the most recent promotions; the oldest entry is evicted first.
#[derive(Debug)]
pub struct PromotionTracker {
    capacity: usize,
    state: Mutex<TrackerState>,
}

impl PromotionTracker {
    /// Tracker retaining at most `capacity` promotions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn store(&self, promotion_id: &str, state: TrackingState) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let tracker = &mut *guard;
        if !tracker.entries.contains_key(promotion_id) {
            tracker.order.push_back(promotion_id.to_string());
        }
        tracker.entries.insert(
            promotion_id.to_string(),
            TrackedPromotion {
                promotion_id: promotion_id.to_string(),
                state,
                updated_at: Utc::now(),
            },
        );
        while tracker.order.len() > self.capacity {
            if let Some(evicted) = tracker.order.pop_front() {
                tracker.entries.remove(&evicted);
            }
        }
    }

    /// Record that `promotion_id` has been submitted.
    pub fn begin(&self, promotion_id: &str) {
        self.store(promotion_id, TrackingState::InProgress);
    }

    /// Record the terminal result of `promotion_id`.
    pub fn finish(&self, promotion_id: &str, record: PromotionRecord) {
        self.store(promotion_id, TrackingState::Finished { record });
    }

    /// Current state of `promotion_id`, if still retained.
    #[must_use]
    pub fn get(&self, promotion_id: &str) -> Option<TrackedPromotion> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(promotion_id)
            .cloned()
    }

    /// Number of retained promotions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::{GroupPromoteRequest, StoreKey};

    fn group_record(id: &str) -> PromotionRecord {
        let request = GroupPromoteRequest::new(StoreKey::hosted("maven", "builds"), "public")
            .with_promotion_id(id);
        PromotionRecord::Group(GroupPromoteResult::new(request))
    }

    #[test]
    fn begin_then_finish_updates_state() {
        let tracker = PromotionTracker::new(4);
        tracker.begin("p1");
        assert_eq!(
            tracker.get("p1").map(|tracked| tracked.state),
            Some(TrackingState::InProgress)
        );
        tracker.finish("p1", group_record("p1"));
        let Some(TrackedPromotion {
            state: TrackingState::Finished { record },
            ..
        }) = tracker.get("p1")
        else {
            panic!("expected finished state");
        };
        assert_eq!(record.outcome(), PromotionOutcome::Succeeded);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let tracker = PromotionTracker::new(2);
        tracker.begin("a");
        tracker.begin("b");
        tracker.begin("c");
        assert!(tracker.get("a").is_none());
        assert!(tracker.get("b").is_some());
        assert!(tracker.get("c").is_some());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn unknown_ids_are_absent() {
        let tracker = PromotionTracker::new(1);
        assert!(tracker.is_empty());
        assert!(tracker.get("missing").is_none());
    }
}
