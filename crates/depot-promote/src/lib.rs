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

//! Promotion engine: validated, all-or-nothing promotion of paths between
//! stores and of stores into group membership.
//!
//! Layout: `manager/` (orchestrator, path and group flows), `transfer.rs`
//! (parallel per-path transfers with compensating deletes), `batcher.rs`
//! (batch sizing), `lock.rs` (target group locks), `conflict.rs` (in-flight
//! path conflicts), `pool.rs` (bounded worker pools), `invalidator.rs`
//! (negative-cache clearing), `tracker.rs` (status by promotion id),
//! `callback.rs` (HTTP result delivery), `validator.rs` (no-rule validator),
//! `error.rs` (engine errors).
//!
//! # Wiring
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use depot_config::{PromoteConfig, process_env};
//! use depot_core::{
//!     ContentAccess, NotFoundCache, PathsPromoteRequest, StandardPathClassifier, StoreDirectory,
//!     StoreKey,
//! };
//! use depot_events::EventBus;
//! use depot_promote::{AllowAllValidator, HttpCallbackPoster, PromotionDeps, PromotionManager};
//! use depot_telemetry::{LoggingConfig, Metrics, init_logging};
//!
//! async fn serve(
//!     stores: Arc<dyn StoreDirectory>,
//!     content: Arc<dyn ContentAccess>,
//!     nfc: Arc<dyn NotFoundCache>,
//! ) -> anyhow::Result<()> {
//!     init_logging(&LoggingConfig::from_env(process_env)?)?;
//!     let config = PromoteConfig::resolve(Path::new("promote.json"))?;
//!     let metrics = Metrics::new()?;
//!
//!     let manager = PromotionManager::new(
//!         PromotionDeps {
//!             stores,
//!             content,
//!             classifier: Arc::new(StandardPathClassifier),
//!             validator: Arc::new(AllowAllValidator),
//!             nfc,
//!             callbacks: Arc::new(HttpCallbackPoster::new(config.callback)?),
//!             events: EventBus::new(),
//!             metrics: metrics.clone(),
//!         },
//!         config,
//!     )?;
//!
//!     let request = PathsPromoteRequest::new(
//!         StoreKey::hosted("maven", "staging"),
//!         StoreKey::hosted("maven", "releases"),
//!     );
//!     let result = manager.promote_paths(request, None).await?;
//!     tracing::info!(outcome = result.outcome().as_str(), "promoted");
//!     print!("{}", metrics.render()?);
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod callback;
pub mod conflict;
pub mod error;
pub mod invalidator;
pub mod lock;
pub mod manager;
pub mod pool;
pub mod tracker;
pub mod transfer;
pub mod validator;

pub use callback::HttpCallbackPoster;
pub use conflict::PathConflictManager;
pub use error::{PromoteError, PromoteResult};
pub use invalidator::NfcInvalidator;
pub use lock::TargetLockRegistry;
pub use manager::{PromotionDeps, PromotionManager};
pub use pool::WorkerPool;
pub use tracker::{PromotionRecord, PromotionTracker, TrackedPromotion, TrackingState};
pub use transfer::{TransferExecutor, TransferOutcome};
pub use validator::AllowAllValidator;
