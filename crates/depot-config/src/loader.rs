//! JSON loading and environment overrides.

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::PromoteConfig;

/// Prefix shared by every promotion environment override.
pub const ENV_PREFIX: &str = "DEPOT_PROMOTE_";

/// Read an override from the process environment.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_override<T: FromStr>(field: &str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse::<T>().map_err(|_| {
        ConfigError::invalid(field, Some(raw.to_string()), "unparseable environment override")
    })
}

fn parse_flag(field: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            field,
            Some(raw.to_string()),
            "expected a boolean",
        )),
    }
}

impl PromoteConfig {
    /// Parse a JSON document; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed.
    pub fn from_json_str(document: &str) -> ConfigResult<Self> {
        serde_json::from_str(document).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Load configuration from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file exists but cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let document = match fs::read_to_string(path) {
            Ok(document) => document,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "promotion config not found; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "config.read",
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = serde_json::from_str(&document).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        info!(path = %path.display(), "loaded promotion config");
        Ok(config)
    }

    /// Apply `DEPOT_PROMOTE_*` overrides resolved through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for values that do not parse.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(raw) = var("ENABLED") {
            self.enabled = parse_flag("enabled", &raw)?;
        }
        if let Some(raw) = var("LOCK_TIMEOUT_SECONDS") {
            self.lock_timeout_seconds = parse_override("lock_timeout_seconds", &raw)?;
        }
        if let Some(raw) = var("AUTOLOCK_HOSTED_REPOS") {
            self.autolock_hosted_repos = parse_flag("autolock_hosted_repos", &raw)?;
        }
        if let Some(raw) = var("PROMOTION_POOL_THREADS") {
            self.promotion_pool.threads = parse_override("promotion_pool.threads", &raw)?;
        }
        if let Some(raw) = var("TRANSFER_POOL_THREADS") {
            self.transfer_pool.threads = parse_override("transfer_pool.threads", &raw)?;
        }
        if let Some(raw) = var("NFC_CLEAR_TIMEOUT_SECONDS") {
            self.nfc_clear_timeout_seconds = parse_override("nfc_clear_timeout_seconds", &raw)?;
        }
        if let Some(raw) = var("CALLBACK_MAX_ATTEMPTS") {
            self.callback.max_attempts = parse_override("callback.max_attempts", &raw)?;
        }
        if let Some(raw) = var("TRACKER_CAPACITY") {
            self.tracker_capacity = parse_override("tracker_capacity", &raw)?;
        }
        Ok(())
    }

    /// Load from `path`, apply process environment overrides, and validate.
    ///
    /// # Errors
    ///
    /// Propagates load, override, and validation failures.
    pub fn resolve(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides(process_env)?;
        config.validate()?;
        Ok(config)
    }
}
