//! Global tracing subscriber setup.
//!
//! # Design
//! - One entry point installs the subscriber; a second call reports an error
//!   instead of replacing the first.
//! - JSON output keeps the current span's fields, so every line logged inside
//!   a promotion carries its `promotion_id`.

use std::str::FromStr;

use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Level used when neither `RUST_LOG` nor `DEPOT_LOG_LEVEL` is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LEVEL_VAR: &str = "DEPOT_LOG_LEVEL";
const FORMAT_VAR: &str = "DEPOT_LOG_FORMAT";
const BUILD_SHA_VAR: &str = "DEPOT_BUILD_SHA";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable multi-field lines.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(TelemetryError::UnknownLogFormat {
                value: raw.to_string(),
            }),
        }
    }
}

/// Logging settings for [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier logged once at startup.
    pub build_sha: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
            build_sha: "dev".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Settings from `DEPOT_LOG_LEVEL`, `DEPOT_LOG_FORMAT` and
    /// `DEPOT_BUILD_SHA`, resolved through `lookup`; unset variables keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnknownLogFormat`] for an unrecognised format.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(level) = lookup(LEVEL_VAR) {
            config.level = level;
        }
        if let Some(format) = lookup(FORMAT_VAR) {
            config.format = format.parse()?;
        }
        if let Some(sha) = lookup(BUILD_SHA_VAR) {
            config.build_sha = sha;
        }
        Ok(config)
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;

    if BUILD_SHA.set(config.build_sha.clone()).is_err() {
        return Ok(());
    }
    info!(build_sha = %config.build_sha, format = ?config.format, "logging initialised");
    Ok(())
}

/// Build identifier recorded by [`init_logging`], or `dev` before it ran.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_overrides_defaults() -> anyhow::Result<()> {
        let config = LoggingConfig::from_env(env(&[
            ("DEPOT_LOG_LEVEL", "depot_promote=debug"),
            ("DEPOT_LOG_FORMAT", "JSON"),
        ]))?;
        assert_eq!(config.level, "depot_promote=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.build_sha, "dev");
        assert_eq!(LoggingConfig::from_env(env(&[]))?, LoggingConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = LoggingConfig::from_env(env(&[("DEPOT_LOG_FORMAT", "xml")]));
        assert!(matches!(
            result,
            Err(TelemetryError::UnknownLogFormat { ref value }) if value == "xml"
        ));
    }

    #[test]
    fn second_install_reports_subscriber_error() {
        let config = LoggingConfig {
            build_sha: "abc123".to_string(),
            format: LogFormat::Pretty,
            ..LoggingConfig::default()
        };
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "abc123");
    }
}
