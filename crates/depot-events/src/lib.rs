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

//! Event bus for promotion activity.
//!
//! The bus provides a typed event enum, sequential identifiers, and a replay
//! ring so late subscribers can catch up from a known event id. Internally it
//! uses `tokio::broadcast` with a bounded buffer; lagging subscribers skip the
//! events they missed rather than blocking publishers.
//!
//! Layout: `payloads.rs` (event types and envelopes), `routing.rs` (the bus).

pub mod payloads;
pub mod routing;

pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
