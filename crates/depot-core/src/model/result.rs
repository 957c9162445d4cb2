//! Promotion results, per-path outcomes, and validation results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::request::{GroupPromoteRequest, PathsPromoteRequest};

/// Rule outcomes keyed by rule name; a rule absent from the map passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResult {
    errors: BTreeMap<String, String>,
}

impl ValidationResult {
    /// Empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed rule.
    pub fn add_error(&mut self, rule: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(rule.into(), message.into());
    }

    /// Builder form of [`Self::add_error`].
    #[must_use]
    pub fn with_error(mut self, rule: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_error(rule, message);
        self
    }

    /// Whether every rule passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Failed rules and their messages.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }
}

/// Classification of a [`PathTransferResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTransferStatus {
    /// Content was copied.
    Completed,
    /// Nothing needed copying.
    Skipped,
    /// The path failed.
    Failed,
}

/// Outcome of transferring one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTransferResult {
    /// Path that was processed.
    pub path: String,
    /// Failure message, if the path failed.
    pub error: Option<String>,
    /// Whether the path was skipped.
    pub skipped: bool,
}

impl PathTransferResult {
    /// The path was copied.
    #[must_use]
    pub fn completed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: None,
            skipped: false,
        }
    }

    /// The path was skipped.
    #[must_use]
    pub fn skipped(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: None,
            skipped: true,
        }
    }

    /// The path failed with `error`.
    #[must_use]
    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: Some(error.into()),
            skipped: false,
        }
    }

    /// Which of the three outcomes this is.
    #[must_use]
    pub const fn status(&self) -> PathTransferStatus {
        if self.error.is_some() {
            PathTransferStatus::Failed
        } else if self.skipped {
            PathTransferStatus::Skipped
        } else {
            PathTransferStatus::Completed
        }
    }
}

/// Tri-state outcome of a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionOutcome {
    /// Asynchronous request accepted; not yet executed.
    Accepted,
    /// Promotion completed successfully.
    Succeeded,
    /// Promotion failed; see the error or validations.
    Failed,
}

impl PromotionOutcome {
    /// Lowercase label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Result of a path promotion or its rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsPromoteResult {
    /// Request this result answers.
    pub request: PathsPromoteRequest,
    /// Paths discovered before execution.
    #[serde(default)]
    pub pending_paths: BTreeSet<String>,
    /// Paths copied into the target.
    #[serde(default)]
    pub completed_paths: BTreeSet<String>,
    /// Paths that needed no copy.
    #[serde(default)]
    pub skipped_paths: BTreeSet<String>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Validation outcome, when validation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationResult>,
    /// Asynchronous request accepted but not executed yet.
    #[serde(default)]
    pub accepted: bool,
    /// Result describes a completed rollback. Informational only: a rollback
    /// moves the original completed paths into `pending_paths`, so callers
    /// detect a successful rollback by the absence of `error`.
    #[serde(default)]
    pub rolled_back: bool,
}

impl PathsPromoteResult {
    /// Result with nothing recorded yet.
    #[must_use]
    pub const fn new(request: PathsPromoteRequest) -> Self {
        Self {
            request,
            pending_paths: BTreeSet::new(),
            completed_paths: BTreeSet::new(),
            skipped_paths: BTreeSet::new(),
            error: None,
            validations: None,
            accepted: false,
            rolled_back: false,
        }
    }

    /// Acknowledgement for an asynchronous request.
    #[must_use]
    pub fn accepted(request: PathsPromoteRequest) -> Self {
        Self {
            accepted: true,
            ..Self::new(request)
        }
    }

    /// Failed result carrying `error`.
    #[must_use]
    pub fn failed(request: PathsPromoteRequest, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(request)
        }
    }

    /// Builder: set discovered paths.
    #[must_use]
    pub fn with_pending(mut self, pending: BTreeSet<String>) -> Self {
        self.pending_paths = pending;
        self
    }

    /// Builder: set validation outcome.
    #[must_use]
    pub fn with_validations(mut self, validations: ValidationResult) -> Self {
        self.validations = Some(validations);
        self
    }

    /// Whether the promotion succeeded.
    ///
    /// Dry runs never report success: they leave every pending path
    /// uncovered.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        if self.accepted || self.error.is_some() {
            return false;
        }
        if self
            .validations
            .as_ref()
            .is_some_and(|validations| !validations.is_valid())
        {
            return false;
        }
        self.pending_paths
            .iter()
            .all(|path| self.completed_paths.contains(path) || self.skipped_paths.contains(path))
    }

    /// Tri-state outcome.
    #[must_use]
    pub fn outcome(&self) -> PromotionOutcome {
        if self.accepted {
            PromotionOutcome::Accepted
        } else if self.succeeded() {
            PromotionOutcome::Succeeded
        } else {
            PromotionOutcome::Failed
        }
    }
}

/// Result of a group promotion or its rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPromoteResult {
    /// Request this result answers.
    pub request: GroupPromoteRequest,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Validation outcome, when validation ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationResult>,
    /// Asynchronous request accepted but not executed yet.
    #[serde(default)]
    pub accepted: bool,
}

impl GroupPromoteResult {
    /// Successful result.
    #[must_use]
    pub const fn new(request: GroupPromoteRequest) -> Self {
        Self {
            request,
            error: None,
            validations: None,
            accepted: false,
        }
    }

    /// Acknowledgement for an asynchronous request.
    #[must_use]
    pub fn accepted(request: GroupPromoteRequest) -> Self {
        Self {
            accepted: true,
            ..Self::new(request)
        }
    }

    /// Failed result carrying `error`.
    #[must_use]
    pub fn failed(request: GroupPromoteRequest, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(request)
        }
    }

    /// Builder: set validation outcome.
    #[must_use]
    pub fn with_validations(mut self, validations: ValidationResult) -> Self {
        self.validations = Some(validations);
        self
    }

    /// Whether the promotion succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.accepted
            && self.error.is_none()
            && self
                .validations
                .as_ref()
                .is_none_or(ValidationResult::is_valid)
    }

    /// Tri-state outcome.
    #[must_use]
    pub fn outcome(&self) -> PromotionOutcome {
        if self.accepted {
            PromotionOutcome::Accepted
        } else if self.succeeded() {
            PromotionOutcome::Succeeded
        } else {
            PromotionOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoreKey;

    fn request() -> PathsPromoteRequest {
        PathsPromoteRequest::new(
            StoreKey::hosted("maven", "staging"),
            StoreKey::hosted("maven", "releases"),
        )
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn path_transfer_result_has_exactly_one_status() {
        assert_eq!(
            PathTransferResult::completed("a").status(),
            PathTransferStatus::Completed
        );
        assert_eq!(
            PathTransferResult::skipped("a").status(),
            PathTransferStatus::Skipped
        );
        assert_eq!(
            PathTransferResult::failed("a", "boom").status(),
            PathTransferStatus::Failed
        );
    }

    #[test]
    fn succeeded_requires_full_coverage() {
        let mut result = PathsPromoteResult::new(request()).with_pending(set(&["a", "b"]));
        result.completed_paths = set(&["a"]);
        assert!(!result.succeeded());
        result.skipped_paths = set(&["b"]);
        assert!(result.succeeded());
        assert_eq!(result.outcome(), PromotionOutcome::Succeeded);
    }

    #[test]
    fn error_or_invalid_validation_fails() {
        let failed = PathsPromoteResult::failed(request(), "boom");
        assert_eq!(failed.outcome(), PromotionOutcome::Failed);

        let invalid = PathsPromoteResult::new(request())
            .with_validations(ValidationResult::new().with_error("no-snapshots", "snapshot found"));
        assert!(!invalid.succeeded());
    }

    #[test]
    fn accepted_is_neither_success_nor_failure() {
        let result = PathsPromoteResult::accepted(request());
        assert!(!result.succeeded());
        assert_eq!(result.outcome(), PromotionOutcome::Accepted);
    }

    #[test]
    fn rolled_back_flag_does_not_cover_pending_paths() {
        let mut result = PathsPromoteResult::new(request()).with_pending(set(&["a.jar"]));
        result.rolled_back = true;
        assert!(result.error.is_none());
        assert!(!result.succeeded());
        assert_eq!(result.outcome(), PromotionOutcome::Failed);
    }

    #[test]
    fn empty_pending_set_succeeds_trivially() {
        assert!(PathsPromoteResult::new(request()).succeeded());
    }

    #[test]
    fn group_result_outcomes() {
        let group_request = GroupPromoteRequest::new(StoreKey::hosted("maven", "a"), "public");
        assert!(GroupPromoteResult::new(group_request.clone()).succeeded());
        assert!(!GroupPromoteResult::failed(group_request.clone(), "x").succeeded());
        assert_eq!(
            GroupPromoteResult::accepted(group_request).outcome(),
            PromotionOutcome::Accepted
        );
    }

    #[test]
    fn validation_result_serializes_as_plain_map() -> anyhow::Result<()> {
        let validations = ValidationResult::new().with_error("rule", "message");
        assert_eq!(
            serde_json::to_value(&validations)?,
            serde_json::json!({"rule": "message"})
        );
        Ok(())
    }
}
