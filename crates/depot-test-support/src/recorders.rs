//! Scriptable validator and recording collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use depot_core::{
    CallbackError, CallbackPayload, CallbackPoster, CallbackTarget, ConcreteResource,
    NotFoundCache, PromoteRequestRef, PromotionValidator, StoreKey, ValidationError,
    ValidationResult,
};

#[derive(Debug, Clone)]
enum Script {
    Pass,
    Fail { rule: String, message: String },
    Broken { rule_set: String },
    Panic,
}

/// Validator returning a fixed verdict, optionally after a delay.
#[derive(Debug)]
pub struct ScriptedValidator {
    script: Mutex<Script>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl ScriptedValidator {
    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every request passes.
    #[must_use]
    pub fn passing() -> Self {
        Self::with_script(Script::Pass)
    }

    /// Every request fails `rule` with `message`.
    #[must_use]
    pub fn failing(rule: &str, message: &str) -> Self {
        Self::with_script(Script::Fail {
            rule: rule.to_string(),
            message: message.to_string(),
        })
    }

    /// Validation infrastructure is unavailable.
    #[must_use]
    pub fn broken(rule_set: &str) -> Self {
        Self::with_script(Script::Broken {
            rule_set: rule_set.to_string(),
        })
    }

    /// Every validation panics, aborting the promotion task running it.
    #[must_use]
    pub fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    /// Hold each validation for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of validations run.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromotionValidator for ScriptedValidator {
    async fn validate(
        &self,
        _request: PromoteRequestRef<'_>,
        _base_url: Option<&str>,
    ) -> Result<ValidationResult, ValidationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match script {
            Script::Pass => Ok(ValidationResult::new()),
            Script::Fail { rule, message } => Ok(ValidationResult::new().with_error(rule, message)),
            Script::Broken { rule_set } => Err(ValidationError::RuleSetUnavailable { rule_set }),
            Script::Panic => panic!("scripted validator panic"),
        }
    }
}

/// Negative cache that records every cleared resource.
#[derive(Debug, Default)]
pub struct RecordingNfc {
    cleared: Mutex<Vec<ConcreteResource>>,
}

impl RecordingNfc {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cleared resource, in order.
    #[must_use]
    pub fn cleared(&self) -> Vec<ConcreteResource> {
        self.cleared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `path` was cleared in `store`.
    #[must_use]
    pub fn was_cleared(&self, store: &StoreKey, path: &str) -> bool {
        self.cleared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|resource| &resource.store == store && resource.path == path)
    }
}

#[async_trait]
impl NotFoundCache for RecordingNfc {
    async fn clear_missing(&self, resource: &ConcreteResource) {
        self.cleared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource.clone());
    }
}

/// Callback poster that keeps delivered payloads as JSON.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    delivered: Mutex<Vec<(CallbackTarget, serde_json::Value)>>,
}

impl RecordingCallbacks {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered targets and payloads, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<(CallbackTarget, serde_json::Value)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CallbackPoster for RecordingCallbacks {
    async fn deliver(
        &self,
        target: &CallbackTarget,
        payload: CallbackPayload<'_>,
    ) -> Result<(), CallbackError> {
        let body = serde_json::to_value(payload).map_err(|err| CallbackError::Transport {
            url: target.url.clone(),
            attempts: 1,
            source: Box::new(err),
        })?;
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((target.clone(), body));
        Ok(())
    }
}
