#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Store model, promotion DTOs, and collaborator interfaces shared by the
//! depot promotion engine.
//!
//! Layout: `model/` (store keys, stores, promotion requests and results),
//! `service/` (collaborator traits consumed by the engine), `special.rs`
//! (standard special-path classification), `error.rs` (collaborator errors).

pub mod error;
pub mod model;
pub mod service;
pub mod special;

pub use error::{
    BoxError, CallbackError, ContentError, ContentResult, CoreError, StoreError, StoreResult,
    ValidationError, error_chain,
};
pub use model::{
    ArtifactStore, CallbackMethod, CallbackTarget, ChangeSummary, ConcreteResource, Group,
    GroupPromoteRequest, GroupPromoteResult, HostedRepository, PKG_TYPE_GENERIC_HTTP,
    PKG_TYPE_MAVEN, PKG_TYPE_NPM, PathTransferResult, PathTransferStatus, PathsPromoteRequest,
    PathsPromoteResult, PromoteRequestRef, PromotionOutcome, RemoteRepository, SpecialPathInfo,
    StoreKey, StoreType, Transfer, ValidationResult,
};
pub use service::{
    CallbackPayload, CallbackPoster, ContentAccess, ContentStream, NotFoundCache,
    PromotionValidator, SpecialPathClassifier, StoreDirectory,
};
pub use special::StandardPathClassifier;
