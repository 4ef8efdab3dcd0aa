//! Lease store abstraction
//!
//! A lease store is any expiring key-value store that can run the four
//! primitives below atomically on its side. The lock never coordinates
//! holders client-side; exclusion comes entirely from `set_if_absent` and
//! ownership checks from `compare_and_extend` / `compare_and_delete`.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: in-process, driven by tokio's clock
//! - `RedisStore` (feature `redis`): Lua scripts over a reconnecting connection

mod memory;
#[cfg(feature = "redis")]
mod redis;
mod scripts;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use scripts::{COMPARE_AND_DELETE, COMPARE_AND_EXTEND};

/// Outcome of a compare-and-extend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extend {
    /// The key held the caller's token and its TTL was reset
    Extended,
    /// The key is absent or held by another token; nothing changed
    NotOwner,
}

/// Primitives a store must offer for lease locking.
///
/// Every method is a single atomic operation on the store side.
#[async_trait]
pub trait LeaseStore: Send + Sync + fmt::Debug {
    /// Create `key = token` with expiry `ttl` only if `key` does not exist.
    ///
    /// Returns `Ok(true)` when this call created the key.
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Reset the TTL of `key` to `ttl` only if its value equals `token`.
    async fn compare_and_extend(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<Extend, StoreError>;

    /// Delete `key` only if its value equals `token`.
    ///
    /// Returns `Ok(true)` when the key was deleted.
    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool, StoreError>;

    /// Delete `key` unconditionally.
    ///
    /// Returns `Ok(true)` when a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// TTL in whole milliseconds as sent to the store, never below 1ms.
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
