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

//! Shared test helpers used across integration suites.
//! Layout: stores.rs (in-memory store directory), content.rs (in-memory content with failure injection), recorders.rs (validator, negative cache and callback fakes), fixtures.rs (polling helpers).

pub mod content;
pub mod fixtures;
pub mod recorders;
pub mod stores;

pub use content::MemoryContent;
pub use fixtures::eventually;
pub use recorders::{RecordingCallbacks, RecordingNfc, ScriptedValidator};
pub use stores::MemoryStores;
