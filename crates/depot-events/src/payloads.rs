//! Event payload types published by the promotion engine.

use chrono::{DateTime, Utc};
use depot_core::StoreKey;

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events emitted by promotions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Paths were copied into a target store.
    PathsPromoted {
        /// Correlation token of the promotion.
        promotion_id: String,
        /// Store the paths came from.
        source: StoreKey,
        /// Store the paths were copied into.
        target: StoreKey,
        /// Paths that were copied.
        paths: Vec<String>,
    },
    /// A path promotion was undone.
    PathsRolledBack {
        /// Correlation token of the original promotion.
        promotion_id: String,
        /// Source of the original promotion.
        source: StoreKey,
        /// Target the paths were removed from.
        target: StoreKey,
        /// Paths moved back to the source.
        paths: Vec<String>,
    },
    /// A store joined a group.
    GroupMemberAdded {
        /// Correlation token of the promotion.
        promotion_id: String,
        /// Group that changed.
        group: StoreKey,
        /// Store that was added.
        member: StoreKey,
    },
    /// A store left a group during rollback.
    GroupMemberRemoved {
        /// Correlation token of the original promotion.
        promotion_id: String,
        /// Group that changed.
        group: StoreKey,
        /// Store that was removed.
        member: StoreKey,
    },
    /// A hosted repository was marked read-only after promotion.
    StoreLocked {
        /// Repository that was locked.
        store: StoreKey,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PathsPromoted { .. } => "paths_promoted",
            Self::PathsRolledBack { .. } => "paths_rolled_back",
            Self::GroupMemberAdded { .. } => "group_member_added",
            Self::GroupMemberRemoved { .. } => "group_member_removed",
            Self::StoreLocked { .. } => "store_locked",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> StoreKey {
        StoreKey::hosted("maven", name)
    }

    #[test]
    fn event_kind_maps_every_variant() {
        let cases = [
            (
                Event::PathsPromoted {
                    promotion_id: "p".into(),
                    source: key("a"),
                    target: key("b"),
                    paths: vec!["x".into()],
                },
                "paths_promoted",
            ),
            (
                Event::PathsRolledBack {
                    promotion_id: "p".into(),
                    source: key("a"),
                    target: key("b"),
                    paths: Vec::new(),
                },
                "paths_rolled_back",
            ),
            (
                Event::GroupMemberAdded {
                    promotion_id: "p".into(),
                    group: StoreKey::group("maven", "public"),
                    member: key("a"),
                },
                "group_member_added",
            ),
            (
                Event::GroupMemberRemoved {
                    promotion_id: "p".into(),
                    group: StoreKey::group("maven", "public"),
                    member: key("a"),
                },
                "group_member_removed",
            ),
            (Event::StoreLocked { store: key("a") }, "store_locked"),
        ];
        for (event, expected) in cases {
            assert_eq!(event.kind(), expected);
        }
    }

    #[test]
    fn events_serialize_with_type_tag() -> anyhow::Result<()> {
        let json = serde_json::to_value(Event::StoreLocked { store: key("a") })?;
        assert_eq!(json["type"], "store_locked");
        assert_eq!(json["store"]["name"], "a");
        Ok(())
    }
}
