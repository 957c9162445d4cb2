//! Default values for the promotion configuration.
//!
//! # Design
//! - Centralize defaults so serde and `Default` impls agree.
//! - Pool sizes keep request handling separate from per-batch transfers.

/// Section name used in error reports.
pub const SECTION: &str = "promote";
/// Seconds to wait for a target group lock.
pub const LOCK_TIMEOUT_SECONDS: u64 = 30;
/// Threads serving promotion requests.
pub const PROMOTION_POOL_THREADS: usize = 8;
/// Informational priority of the promotion pool.
pub const PROMOTION_POOL_PRIORITY: u8 = 8;
/// Queued-work multiplier before the promotion pool rejects submissions.
pub const PROMOTION_POOL_MAX_LOAD_FACTOR: usize = 10;
/// Threads running path-transfer batches.
pub const TRANSFER_POOL_THREADS: usize = 40;
/// Informational priority of the transfer pool.
pub const TRANSFER_POOL_PRIORITY: u8 = 6;
/// Queued-work multiplier before the transfer pool rejects submissions.
pub const TRANSFER_POOL_MAX_LOAD_FACTOR: usize = 100;
/// Deadline for one negative-cache invalidation task.
pub const NFC_CLEAR_TIMEOUT_SECONDS: u64 = 300;
/// Per-attempt timeout for callback delivery.
pub const CALLBACK_TIMEOUT_SECONDS: u64 = 30;
/// Attempts made to deliver a callback.
pub const CALLBACK_MAX_ATTEMPTS: u32 = 3;
/// Initial delay between callback attempts.
pub const CALLBACK_RETRY_DELAY_MS: u64 = 500;
/// Asynchronous results retained for polling.
pub const TRACKER_CAPACITY: usize = 1_024;
