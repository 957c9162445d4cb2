//! Telemetry errors.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while setting up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Subscriber initialisation error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// Log format name not recognised.
    #[error("unknown log format")]
    UnknownLogFormat {
        /// Value that was supplied.
        value: String,
    },
    /// A metric family could not be built.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Metric name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// A metric family could not be registered.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Metric name.
        name: &'static str,
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Text exposition failed.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Encoded exposition was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}
