//! # Tether Lock
//!
//! Lease-based distributed mutex over an expiring key-value store.
//!
//! A [`Locker`] acquires a named lock by creating a key with a TTL only if it
//! does not exist. While held, a background [`Watchdog`] extends the TTL every
//! two thirds of the lease. If the holder dies or is partitioned from the
//! store, renewals stop and the lease expires on its own, so the name is never
//! stuck forever.
//!
//! Guarantees are best-effort: a holder whose renewals fail keeps believing
//! it holds the lock after the store has let it go, and there are no fencing
//! tokens for downstream resources.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether_lock::{LockOptions, Locker, registry};
//!
//! registry::init_default_client("127.0.0.1:6379", 0, "", "").await?;
//!
//! let mut lock = Locker::new("jobs:nightly", LockOptions::new().with_lease(Duration::from_secs(10)))?;
//! if lock.lock().await? {
//!     // critical section
//!     lock.unlock().await?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod locker;
pub mod options;
pub mod registry;
pub mod store;
pub mod token;
pub mod watchdog;

pub use config::RedisConfig;
pub use error::{LockError, Result, StoreError};
pub use events::{EventBus, LockEvent};
pub use locker::{LockState, Locker};
pub use options::{DEFAULT_LEASE, LockOptions, MAX_LEASE, MIN_LEASE, ReleaseMode};
pub use registry::{default_store, set_default_store};
#[cfg(feature = "redis")]
pub use registry::{init_default_client, init_default_from_config};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{Extend, LeaseStore, MemoryStore};
pub use token::OwnerToken;
pub use watchdog::{RenewalStats, Watchdog, renew_interval};
