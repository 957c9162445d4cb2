//! Error types for store, content, validation, and callback collaborators.
//!
//! # Design
//! - Constant error messages; context (operation, store, path) lives in fields.
//! - Collaborator backends wrap their own failures as boxed sources.
//! - `error_chain` renders a full source chain for embedding in results.

use std::error::Error;
use std::fmt::Write as _;
use std::io;

use thiserror::Error;

use crate::model::StoreKey;

/// Boxed error used by collaborator backends.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Result alias for store directory operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for content access operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// Errors raised while parsing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A store key string did not have the `package:type:name` shape.
    #[error("invalid store key")]
    InvalidStoreKey {
        /// Offending input.
        value: String,
    },
    /// A store type label was not one of `hosted`, `remote`, `group`.
    #[error("invalid store type")]
    InvalidStoreType {
        /// Offending input.
        value: String,
    },
}

/// Errors raised by the store directory.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store directory failed.
    #[error("store directory operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Store involved in the failure, when known.
        key: Option<StoreKey>,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// A store existed but had an unexpected type for the operation.
    #[error("unexpected store type")]
    UnexpectedType {
        /// Store that was inspected.
        key: StoreKey,
        /// Type label the caller required.
        expected: &'static str,
    },
}

impl StoreError {
    /// Wrap a backend failure.
    pub fn backend(
        operation: &'static str,
        key: Option<StoreKey>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Backend {
            operation,
            key,
            source: source.into(),
        }
    }
}

/// Errors raised by content access.
#[derive(Debug, Error)]
pub enum ContentError {
    /// IO failure while reading or writing content.
    #[error("content io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Store holding the content.
        store: StoreKey,
        /// Path within the store.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Requested content is absent.
    #[error("content not found")]
    NotFound {
        /// Store that was searched.
        store: StoreKey,
        /// Path that was missing.
        path: String,
    },
    /// The content backend failed for another reason.
    #[error("content backend failure")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

impl ContentError {
    /// Wrap an IO failure for a store path.
    pub fn io(
        operation: &'static str,
        store: &StoreKey,
        path: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Io {
            operation,
            store: store.clone(),
            path: path.into(),
            source,
        }
    }
}

/// Infrastructure errors raised while running validation rules.
///
/// A rule that fails is not an error; it is recorded in a `ValidationResult`.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A rule could not be executed at all.
    #[error("validation rule execution failed")]
    RuleExecution {
        /// Rule that could not run.
        rule: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// The rule set referenced by the target store could not be loaded.
    #[error("validation rule set unavailable")]
    RuleSetUnavailable {
        /// Rule set identifier.
        rule_set: String,
    },
}

/// Errors raised while delivering a promotion result to a callback target.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The callback endpoint rejected every attempt.
    #[error("callback rejected")]
    Rejected {
        /// Callback URL.
        url: String,
        /// Status code of the last attempt.
        status: u16,
        /// Number of attempts performed.
        attempts: u32,
    },
    /// The request could not be sent.
    #[error("callback transport failure")]
    Transport {
        /// Callback URL.
        url: String,
        /// Number of attempts performed.
        attempts: u32,
        /// Underlying transport failure.
        #[source]
        source: BoxError,
    },
    /// The callback descriptor was unusable.
    #[error("invalid callback target")]
    InvalidTarget {
        /// Callback URL.
        url: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}

/// Render an error with its full source chain, separated by `: `.
#[must_use]
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let _ = write!(rendered, ": {cause}");
        current = cause.source();
    }
    rendered
}
