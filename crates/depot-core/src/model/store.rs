//! Store keys, store definitions, and content handles.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Package type served by Maven clients.
pub const PKG_TYPE_MAVEN: &str = "maven";
/// Package type served by npm clients.
pub const PKG_TYPE_NPM: &str = "npm";
/// Package type for plain HTTP content.
pub const PKG_TYPE_GENERIC_HTTP: &str = "generic-http";

/// Kind of store a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// Store that owns writable content.
    Hosted,
    /// Store mirroring an external origin.
    Remote,
    /// Virtual store aggregating an ordered list of members.
    Group,
}

impl StoreType {
    /// Render the type as its lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Remote => "remote",
            Self::Group => "group",
        }
    }
}

impl FromStr for StoreType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hosted" => Ok(Self::Hosted),
            "remote" => Ok(Self::Remote),
            "group" => Ok(Self::Group),
            other => Err(CoreError::InvalidStoreType {
                value: other.to_string(),
            }),
        }
    }
}

/// Structural identifier of a store: `(package type, store type, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    /// Package type the store serves (e.g. `maven`, `npm`).
    pub package_type: String,
    /// Kind of store.
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Store name, unique within `(package_type, store_type)`.
    pub name: String,
}

impl StoreKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(
        package_type: impl Into<String>,
        store_type: StoreType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    /// Key of a hosted repository.
    #[must_use]
    pub fn hosted(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Hosted, name)
    }

    /// Key of a remote repository.
    #[must_use]
    pub fn remote(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Remote, name)
    }

    /// Key of a group.
    #[must_use]
    pub fn group(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(package_type, StoreType::Group, name)
    }

    /// Whether the key names a concrete (non-group) store.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.store_type != StoreType::Group
    }
}

impl Display for StoreKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}:{}:{}",
            self.package_type,
            self.store_type.as_str(),
            self.name
        )
    }
}

impl FromStr for StoreKey {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(package_type), Some(store_type), Some(name))
                if !package_type.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(package_type, store_type.parse()?, name))
            }
            _ => Err(CoreError::InvalidStoreKey {
                value: value.to_string(),
            }),
        }
    }
}

/// Hosted repository definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedRepository {
    /// Store key; always of type `hosted`.
    pub key: StoreKey,
    /// Read-only hosted repositories reject uploads other than promotions.
    #[serde(default)]
    pub readonly: bool,
}

impl HostedRepository {
    /// Build a writable hosted repository.
    #[must_use]
    pub fn new(package_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: StoreKey::hosted(package_type, name),
            readonly: false,
        }
    }
}

/// Remote repository definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    /// Store key; always of type `remote`.
    pub key: StoreKey,
    /// Origin URL mirrored by the repository.
    pub url: String,
}

impl RemoteRepository {
    /// Build a remote repository for an origin URL.
    #[must_use]
    pub fn new(
        package_type: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            key: StoreKey::remote(package_type, name),
            url: url.into(),
        }
    }
}

/// Group definition: an ordered list of member stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Store key; always of type `group`.
    pub key: StoreKey,
    /// Member stores in resolution order.
    #[serde(default)]
    pub constituents: Vec<StoreKey>,
}

impl Group {
    /// Build a group with the given members.
    #[must_use]
    pub fn new(
        package_type: impl Into<String>,
        name: impl Into<String>,
        constituents: Vec<StoreKey>,
    ) -> Self {
        Self {
            key: StoreKey::group(package_type, name),
            constituents,
        }
    }

    /// Whether `member` is a direct constituent.
    #[must_use]
    pub fn contains(&self, member: &StoreKey) -> bool {
        self.constituents.contains(member)
    }

    /// Append `member` unless already present; returns whether it was added.
    pub fn add_constituent(&mut self, member: StoreKey) -> bool {
        if self.contains(&member) {
            return false;
        }
        self.constituents.push(member);
        true
    }

    /// Remove `member`; returns whether it was present.
    pub fn remove_constituent(&mut self, member: &StoreKey) -> bool {
        let before = self.constituents.len();
        self.constituents.retain(|existing| existing != member);
        before != self.constituents.len()
    }
}

/// Any store known to the store directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "store_kind", rename_all = "snake_case")]
pub enum ArtifactStore {
    /// Hosted repository.
    Hosted(HostedRepository),
    /// Remote repository.
    Remote(RemoteRepository),
    /// Group.
    Group(Group),
}

impl ArtifactStore {
    /// Key of the wrapped store.
    #[must_use]
    pub const fn key(&self) -> &StoreKey {
        match self {
            Self::Hosted(store) => &store.key,
            Self::Remote(store) => &store.key,
            Self::Group(store) => &store.key,
        }
    }

    /// Package type of the wrapped store.
    #[must_use]
    pub fn package_type(&self) -> &str {
        &self.key().package_type
    }

    /// Borrow the group definition, if this store is a group.
    #[must_use]
    pub const fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Take the group definition, if this store is a group.
    #[must_use]
    pub fn into_group(self) -> Option<Group> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Take the hosted definition, if this store is a hosted repository.
    #[must_use]
    pub fn into_hosted(self) -> Option<HostedRepository> {
        match self {
            Self::Hosted(hosted) => Some(hosted),
            _ => None,
        }
    }
}

impl From<HostedRepository> for ArtifactStore {
    fn from(value: HostedRepository) -> Self {
        Self::Hosted(value)
    }
}

impl From<RemoteRepository> for ArtifactStore {
    fn from(value: RemoteRepository) -> Self {
        Self::Remote(value)
    }
}

impl From<Group> for ArtifactStore {
    fn from(value: Group) -> Self {
        Self::Group(value)
    }
}

/// Attribution recorded alongside a persisted store change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// User responsible for the change.
    pub user: String,
    /// Human-readable description.
    pub summary: String,
}

impl ChangeSummary {
    /// Build a change summary.
    #[must_use]
    pub fn new(user: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            summary: summary.into(),
        }
    }
}

/// Handle to a path inside a store, as returned by content access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transfer {
    store: StoreKey,
    path: String,
}

impl Transfer {
    /// Build a handle for `path` within `store`.
    #[must_use]
    pub fn new(store: StoreKey, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Store holding the content.
    #[must_use]
    pub const fn store(&self) -> &StoreKey {
        &self.store
    }

    /// Path within the store.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl Display for Transfer {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.store, self.path)
    }
}

/// Store path whose negative-cache entry can be invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConcreteResource {
    /// Store holding the resource.
    pub store: StoreKey,
    /// Path within the store.
    pub path: String,
}

impl ConcreteResource {
    /// Build a resource reference.
    #[must_use]
    pub fn new(store: StoreKey, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }
}

/// Classification of a path that needs special promotion handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecialPathInfo {
    /// Metadata is regenerated by merging group members and is never copied.
    pub metadata: bool,
    /// Decoratable paths get generated side files (checksums) on demand.
    pub decoratable: bool,
}
