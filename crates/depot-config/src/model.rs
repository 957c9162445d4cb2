//! Typed configuration models for the promotion engine.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults;

/// Sizing of one bounded worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent workers.
    pub threads: usize,
    /// Operator-facing priority label; recorded on the pool span only.
    pub priority: u8,
    /// Submissions beyond `threads * max_load_factor` in flight are rejected.
    pub max_load_factor: usize,
}

impl PoolConfig {
    /// Defaults for the promotion-request pool.
    #[must_use]
    pub const fn promotion_default() -> Self {
        Self {
            threads: defaults::PROMOTION_POOL_THREADS,
            priority: defaults::PROMOTION_POOL_PRIORITY,
            max_load_factor: defaults::PROMOTION_POOL_MAX_LOAD_FACTOR,
        }
    }

    /// Defaults for the path-transfer pool.
    #[must_use]
    pub const fn transfer_default() -> Self {
        Self {
            threads: defaults::TRANSFER_POOL_THREADS,
            priority: defaults::TRANSFER_POOL_PRIORITY,
            max_load_factor: defaults::TRANSFER_POOL_MAX_LOAD_FACTOR,
        }
    }

    /// Maximum tasks admitted (running plus queued).
    #[must_use]
    pub const fn max_load(&self) -> usize {
        self.threads.saturating_mul(self.max_load_factor)
    }
}

/// Pool section as written in a document; absent fields fall back to the
/// defaults of the pool being configured.
#[derive(Debug, Deserialize)]
struct PoolOverrides {
    threads: Option<usize>,
    priority: Option<u8>,
    max_load_factor: Option<usize>,
}

impl PoolOverrides {
    fn over(self, base: PoolConfig) -> PoolConfig {
        PoolConfig {
            threads: self.threads.unwrap_or(base.threads),
            priority: self.priority.unwrap_or(base.priority),
            max_load_factor: self.max_load_factor.unwrap_or(base.max_load_factor),
        }
    }
}

fn promotion_pool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PoolConfig, D::Error> {
    PoolOverrides::deserialize(deserializer).map(|pool| pool.over(PoolConfig::promotion_default()))
}

fn transfer_pool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PoolConfig, D::Error> {
    PoolOverrides::deserialize(deserializer).map(|pool| pool.over(PoolConfig::transfer_default()))
}

/// Callback delivery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Per-attempt request timeout.
    pub timeout_seconds: u64,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each subsequent retry.
    pub retry_delay_ms: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::CALLBACK_TIMEOUT_SECONDS,
            max_attempts: defaults::CALLBACK_MAX_ATTEMPTS,
            retry_delay_ms: defaults::CALLBACK_RETRY_DELAY_MS,
        }
    }
}

impl CallbackConfig {
    /// Per-attempt request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Promotion engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoteConfig {
    /// When false every promotion request fails immediately.
    pub enabled: bool,
    /// Seconds to wait for a target group lock.
    pub lock_timeout_seconds: u64,
    /// Mark hosted sources read-only after group promotion.
    pub autolock_hosted_repos: bool,
    /// Pool serving promotion requests.
    #[serde(deserialize_with = "promotion_pool")]
    pub promotion_pool: PoolConfig,
    /// Pool running path-transfer batches.
    #[serde(deserialize_with = "transfer_pool")]
    pub transfer_pool: PoolConfig,
    /// Deadline for one negative-cache invalidation task.
    pub nfc_clear_timeout_seconds: u64,
    /// Callback delivery policy.
    pub callback: CallbackConfig,
    /// Asynchronous results retained for polling.
    pub tracker_capacity: usize,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_timeout_seconds: defaults::LOCK_TIMEOUT_SECONDS,
            autolock_hosted_repos: true,
            promotion_pool: PoolConfig::promotion_default(),
            transfer_pool: PoolConfig::transfer_default(),
            nfc_clear_timeout_seconds: defaults::NFC_CLEAR_TIMEOUT_SECONDS,
            callback: CallbackConfig::default(),
            tracker_capacity: defaults::TRACKER_CAPACITY,
        }
    }
}

impl PromoteConfig {
    /// Target lock acquisition timeout.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }

    /// Deadline for one negative-cache invalidation task.
    #[must_use]
    pub const fn nfc_clear_timeout(&self) -> Duration {
        Duration::from_secs(self.nfc_clear_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PromoteConfig::default();
        assert!(config.enabled);
        assert!(config.autolock_hosted_repos);
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.promotion_pool.threads, 8);
        assert_eq!(config.promotion_pool.priority, 8);
        assert_eq!(config.transfer_pool.threads, 40);
        assert_eq!(config.transfer_pool.priority, 6);
        assert_eq!(config.transfer_pool.max_load(), 4_000);
        assert_eq!(config.callback.max_attempts, 3);
        assert_eq!(config.tracker_capacity, 1_024);
    }
}
