//! Error types surfaced by the promotion engine.
//!
//! # Design
//! - Client data errors and validation failures are folded into failed
//!   results; only construction and pool admission surface as `Err`.
//! - Constant messages; pool names and load figures live in fields.

use depot_config::ConfigError;
use depot_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised by the promotion engine.
#[derive(Debug, Error)]
pub enum PromoteError {
    /// A worker pool refused new work because it is at capacity.
    #[error("worker pool overloaded")]
    PoolOverloaded {
        /// Pool that rejected the submission.
        pool: String,
        /// Tasks admitted when the submission was rejected.
        load: usize,
        /// Admission limit of the pool.
        limit: usize,
    },
    /// The supplied configuration cannot be used.
    #[error("invalid promotion configuration")]
    Config {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// The HTTP client for callback delivery could not be built.
    #[error("callback http client unavailable")]
    HttpClient {
        /// Client construction failure.
        #[source]
        source: reqwest::Error,
    },
    /// The metrics registry could not be built.
    #[error("promotion metrics unavailable")]
    Telemetry {
        /// Registry failure.
        #[source]
        source: TelemetryError,
    },
}

/// Convenience alias for engine results.
pub type PromoteResult<T> = Result<T, PromoteError>;
