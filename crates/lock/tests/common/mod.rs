//! Shared helpers for lease lock integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tether_lock::{Extend, LeaseStore, LockOptions, MemoryStore, StoreError};

/// Store wrapper that simulates a network link to a [`MemoryStore`].
///
/// While partitioned, every call fails with a transport error and never
/// reaches the store. An optional delay is applied before each call.
#[derive(Debug, Clone)]
pub struct LinkedStore {
    inner: MemoryStore,
    partitioned: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl LinkedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            partitioned: Arc::new(AtomicBool::new(false)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn partition(&self) {
        self.partitioned.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.partitioned.store(false, Ordering::SeqCst);
    }

    async fn cross(&self, operation: &'static str) -> Result<(), StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.partitioned.load(Ordering::SeqCst) {
            return Err(StoreError::transport(operation, "network partition"));
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for LinkedStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.cross("set_if_absent").await?;
        self.inner.set_if_absent(key, token, ttl).await
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<Extend, StoreError> {
        self.cross("compare_and_extend").await?;
        self.inner.compare_and_extend(key, token, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        self.cross("compare_and_delete").await?;
        self.inner.compare_and_delete(key, token).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.cross("delete").await?;
        self.inner.delete(key).await
    }
}

/// Options with `lease` on `store`
pub fn options(store: Arc<dyn LeaseStore>, lease: Duration) -> LockOptions {
    LockOptions::new().with_lease(lease).with_store(store)
}

/// Install a test subscriber; repeated calls are no-ops.
pub fn init_logging() {
    tether_log::try_init_test();
}
