//! Core store and promotion domain types shared across the workspace.

mod request;
mod result;
mod store;

pub use request::{
    CallbackMethod, CallbackTarget, GroupPromoteRequest, PathsPromoteRequest, PromoteRequestRef,
};
pub use result::{
    GroupPromoteResult, PathTransferResult, PathTransferStatus, PathsPromoteResult,
    PromotionOutcome, ValidationResult,
};
pub use store::{
    ArtifactStore, ChangeSummary, ConcreteResource, Group, HostedRepository,
    PKG_TYPE_GENERIC_HTTP, PKG_TYPE_MAVEN, PKG_TYPE_NPM, RemoteRepository, SpecialPathInfo,
    StoreKey, StoreType, Transfer,
};
