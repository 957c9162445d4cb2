#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use depot_config::PromoteConfig;
use depot_core::{Group, HostedRepository, StandardPathClassifier, StoreKey};
use depot_events::{Event, EventBus};
use depot_promote::{PromotionDeps, PromotionManager};
use depot_telemetry::Metrics;
use depot_test_support::{
    MemoryContent, MemoryStores, RecordingCallbacks, RecordingNfc, ScriptedValidator,
};

pub const MAVEN: &str = "maven";
pub const WAIT: Duration = Duration::from_secs(5);

pub fn staging() -> StoreKey {
    StoreKey::hosted(MAVEN, "staging")
}

pub fn builds() -> StoreKey {
    StoreKey::hosted(MAVEN, "builds")
}

pub fn releases() -> StoreKey {
    StoreKey::hosted(MAVEN, "releases")
}

pub fn public() -> StoreKey {
    StoreKey::group(MAVEN, "public")
}

pub fn everything() -> StoreKey {
    StoreKey::group(MAVEN, "everything")
}

/// Engine wired to in-memory collaborators.
///
/// Topology: `staging`, `builds` and `releases` are hosted; `public` groups
/// `releases`; `everything` groups `public`.
pub struct Harness {
    pub stores: Arc<MemoryStores>,
    pub content: Arc<MemoryContent>,
    pub validator: Arc<ScriptedValidator>,
    pub nfc: Arc<RecordingNfc>,
    pub callbacks: Arc<RecordingCallbacks>,
    pub events: EventBus,
    pub metrics: Metrics,
    pub manager: PromotionManager,
}

impl Harness {
    pub fn new() -> Result<Self> {
        Self::with(ScriptedValidator::passing(), PromoteConfig::default())
    }

    pub fn with(validator: ScriptedValidator, config: PromoteConfig) -> Result<Self> {
        let stores = Arc::new(MemoryStores::new());
        stores.insert(HostedRepository::new(MAVEN, "staging"));
        stores.insert(HostedRepository::new(MAVEN, "builds"));
        stores.insert(HostedRepository::new(MAVEN, "releases"));
        stores.insert(Group::new(MAVEN, "public", vec![releases()]));
        stores.insert(Group::new(MAVEN, "everything", vec![public()]));

        let content = Arc::new(MemoryContent::new());
        let validator = Arc::new(validator);
        let nfc = Arc::new(RecordingNfc::new());
        let callbacks = Arc::new(RecordingCallbacks::new());
        let events = EventBus::new();
        let metrics = Metrics::new()?;

        let manager = PromotionManager::new(
            PromotionDeps {
                stores: stores.clone(),
                content: content.clone(),
                classifier: Arc::new(StandardPathClassifier),
                validator: validator.clone(),
                nfc: nfc.clone(),
                callbacks: callbacks.clone(),
                events: events.clone(),
                metrics: metrics.clone(),
            },
            config,
        )?;

        Ok(Self {
            stores,
            content,
            validator,
            nfc,
            callbacks,
            events,
            metrics,
            manager,
        })
    }

    /// Put each path into `store` with content derived from the path.
    pub fn seed(&self, store: &StoreKey, paths: &[&str]) {
        for path in paths {
            self.content.put(store, path, format!("content of {path}"));
        }
    }

    /// Every event published so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .backlog_since(0)
            .into_iter()
            .map(|envelope| envelope.event)
            .collect()
    }
}
