//! Process-wide default lease store.
//!
//! Handles built without an explicit store read this once, at construction.
//! It can be installed exactly once and lives for the rest of the process.

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::error::{LockError, Result};
use crate::store::LeaseStore;
#[cfg(feature = "redis")]
use crate::{config::RedisConfig, store::RedisStore};

static DEFAULT_STORE: OnceLock<Arc<dyn LeaseStore>> = OnceLock::new();

/// Install `store` as the process-wide default.
///
/// Fails with [`LockError::DefaultStoreAlreadySet`] if one is installed.
pub fn set_default_store(store: Arc<dyn LeaseStore>) -> Result<()> {
    let description = format!("{store:?}");
    DEFAULT_STORE
        .set(store)
        .map_err(|_| LockError::DefaultStoreAlreadySet)?;
    info!(store = %description, "default lease store installed");
    Ok(())
}

/// The process-wide default store, if installed
#[must_use]
pub fn default_store() -> Option<Arc<dyn LeaseStore>> {
    DEFAULT_STORE.get().cloned()
}

/// Connect to Redis at `address` and install it as the default store.
///
/// Empty `username` / `password` mean none.
#[cfg(feature = "redis")]
pub async fn init_default_client(
    address: &str,
    db: i64,
    username: &str,
    password: &str,
) -> Result<Arc<RedisStore>> {
    let config = RedisConfig::new(address)
        .with_db(db)
        .with_credentials(username, password);
    init_default_from_config(&config).await
}

/// Connect to Redis with `config` and install it as the default store.
#[cfg(feature = "redis")]
pub async fn init_default_from_config(config: &RedisConfig) -> Result<Arc<RedisStore>> {
    if DEFAULT_STORE.get().is_some() {
        return Err(LockError::DefaultStoreAlreadySet);
    }
    let store = Arc::new(RedisStore::connect(config).await?);
    set_default_store(Arc::clone(&store) as Arc<dyn LeaseStore>)?;
    Ok(store)
}
