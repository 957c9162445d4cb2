//! Range checks applied after loading.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{PoolConfig, PromoteConfig};

fn ensure_positive<T>(field: &str, value: T) -> ConfigResult<()>
where
    T: PartialEq + Default + ToString,
{
    if value == T::default() {
        return Err(ConfigError::invalid(
            field,
            Some(value.to_string()),
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_pool(prefix: &str, pool: &PoolConfig) -> ConfigResult<()> {
    ensure_positive(&format!("{prefix}.threads"), pool.threads)?;
    ensure_positive(&format!("{prefix}.max_load_factor"), pool.max_load_factor)
}

impl PromoteConfig {
    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        ensure_positive("lock_timeout_seconds", self.lock_timeout_seconds)?;
        validate_pool("promotion_pool", &self.promotion_pool)?;
        validate_pool("transfer_pool", &self.transfer_pool)?;
        ensure_positive("nfc_clear_timeout_seconds", self.nfc_clear_timeout_seconds)?;
        ensure_positive("callback.timeout_seconds", self.callback.timeout_seconds)?;
        ensure_positive("callback.max_attempts", self.callback.max_attempts)?;
        ensure_positive("tracker_capacity", self.tracker_capacity)
    }
}
