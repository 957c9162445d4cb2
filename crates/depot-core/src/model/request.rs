//! Promotion request value objects.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store::{StoreKey, StoreType};

fn new_promotion_id() -> String {
    Uuid::new_v4().to_string()
}

/// HTTP method used to post a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackMethod {
    /// `POST` the result (default).
    #[default]
    Post,
    /// `PUT` the result.
    Put,
}

/// Where an asynchronous promotion result should be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTarget {
    /// Endpoint receiving the JSON result.
    pub url: String,
    /// HTTP method.
    #[serde(default)]
    pub method: CallbackMethod,
    /// Extra headers sent with the request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl CallbackTarget {
    /// `POST` callback to `url` without extra headers.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: CallbackMethod::Post,
            headers: BTreeMap::new(),
        }
    }
}

/// Request to copy paths from one store into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsPromoteRequest {
    /// Store the content is copied from.
    pub source: StoreKey,
    /// Store the content is copied into.
    pub target: StoreKey,
    /// Explicit paths; empty means every path under the source.
    #[serde(default)]
    pub paths: BTreeSet<String>,
    /// Return immediately and deliver the result later.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Validate and report pending paths without transferring anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Delete promoted paths from the source afterwards.
    #[serde(default)]
    pub purge_source: bool,
    /// Treat an existing target path as an error rather than a skip.
    #[serde(default)]
    pub fail_when_exists: bool,
    /// Publish a `PathsPromoted` event on success.
    #[serde(default)]
    pub fire_events: bool,
    /// Optional result delivery target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackTarget>,
    /// Caller-supplied correlation token.
    #[serde(default = "new_promotion_id")]
    pub promotion_id: String,
}

impl PathsPromoteRequest {
    /// Synchronous request promoting every path of `source` into `target`.
    #[must_use]
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            source,
            target,
            paths: BTreeSet::new(),
            run_async: false,
            dry_run: false,
            purge_source: false,
            fail_when_exists: false,
            fire_events: false,
            callback: None,
            promotion_id: new_promotion_id(),
        }
    }

    /// Restrict the request to explicit paths.
    #[must_use]
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle asynchronous execution.
    #[must_use]
    pub const fn with_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    /// Toggle dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Toggle source purge.
    #[must_use]
    pub const fn with_purge_source(mut self, purge_source: bool) -> Self {
        self.purge_source = purge_source;
        self
    }

    /// Toggle fail-when-exists.
    #[must_use]
    pub const fn with_fail_when_exists(mut self, fail_when_exists: bool) -> Self {
        self.fail_when_exists = fail_when_exists;
        self
    }

    /// Toggle event publication.
    #[must_use]
    pub const fn with_fire_events(mut self, fire_events: bool) -> Self {
        self.fire_events = fire_events;
        self
    }

    /// Attach a callback target.
    #[must_use]
    pub fn with_callback(mut self, callback: CallbackTarget) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Override the promotion id.
    #[must_use]
    pub fn with_promotion_id(mut self, promotion_id: impl Into<String>) -> Self {
        self.promotion_id = promotion_id.into();
        self
    }

    /// Inverse request moving `paths` back from the target into the source.
    ///
    /// The inverse always purges what it moves back, runs synchronously and
    /// publishes no promotion event of its own.
    #[must_use]
    pub fn reversed(&self, paths: BTreeSet<String>) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
            paths,
            run_async: false,
            dry_run: false,
            purge_source: true,
            fail_when_exists: false,
            fire_events: false,
            callback: None,
            promotion_id: self.promotion_id.clone(),
        }
    }
}

/// Request to add a concrete store to a group's membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPromoteRequest {
    /// Store to add to the group.
    pub source: StoreKey,
    /// Name of the target group; its package type is the source's.
    pub target_group: String,
    /// Return immediately and deliver the result later.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// Validate without mutating the group.
    #[serde(default)]
    pub dry_run: bool,
    /// Optional result delivery target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackTarget>,
    /// Caller-supplied correlation token.
    #[serde(default = "new_promotion_id")]
    pub promotion_id: String,
}

impl GroupPromoteRequest {
    /// Synchronous request adding `source` to `target_group`.
    #[must_use]
    pub fn new(source: StoreKey, target_group: impl Into<String>) -> Self {
        Self {
            source,
            target_group: target_group.into(),
            run_async: false,
            dry_run: false,
            callback: None,
            promotion_id: new_promotion_id(),
        }
    }

    /// Toggle asynchronous execution.
    #[must_use]
    pub const fn with_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    /// Toggle dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Attach a callback target.
    #[must_use]
    pub fn with_callback(mut self, callback: CallbackTarget) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Override the promotion id.
    #[must_use]
    pub fn with_promotion_id(mut self, promotion_id: impl Into<String>) -> Self {
        self.promotion_id = promotion_id.into();
        self
    }

    /// Key of the target group.
    #[must_use]
    pub fn target_key(&self) -> StoreKey {
        StoreKey::new(
            self.source.package_type.clone(),
            StoreType::Group,
            self.target_group.clone(),
        )
    }
}

/// Borrowed view over either request variant, as handed to validators.
#[derive(Debug, Clone, Copy)]
pub enum PromoteRequestRef<'a> {
    /// Path promotion.
    Paths(&'a PathsPromoteRequest),
    /// Group promotion.
    Group(&'a GroupPromoteRequest),
}

impl PromoteRequestRef<'_> {
    /// Source store of the request.
    #[must_use]
    pub const fn source(&self) -> &StoreKey {
        match self {
            Self::Paths(request) => &request.source,
            Self::Group(request) => &request.source,
        }
    }

    /// Target store of the request.
    #[must_use]
    pub fn target(&self) -> StoreKey {
        match self {
            Self::Paths(request) => request.target.clone(),
            Self::Group(request) => request.target_key(),
        }
    }

    /// Correlation token of the request.
    #[must_use]
    pub fn promotion_id(&self) -> &str {
        match self {
            Self::Paths(request) => &request.promotion_id,
            Self::Group(request) => &request.promotion_id,
        }
    }
}
