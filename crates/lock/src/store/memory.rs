use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{Extend, LeaseStore};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    set_count: AtomicU32,
    extend_count: AtomicU32,
    delete_count: AtomicU32,
    fail_next_set: AtomicBool,
    fail_next_extend: AtomicBool,
}

/// In-process lease store.
///
/// All primitives run under one mutex, which gives them the same atomicity
/// a server-side script has. Expiry is measured on tokio's clock, so paused
/// test time drives it deterministically. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key = value` with `ttl`, overwriting any existing entry
    pub fn insert(&self, key: &str, value: &str, ttl: Duration) {
        self.inner.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: deadline(ttl),
            },
        );
    }

    /// Current value of a live key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.inner.entries.lock();
        live(&mut entries, key).map(|entry| entry.value.clone())
    }

    /// Remaining time to live of a live key
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.inner.entries.lock();
        let now = Instant::now();
        live(&mut entries, key).map(|entry| entry.expires_at.saturating_duration_since(now))
    }

    /// Whether a live key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of `set_if_absent` calls
    pub fn set_count(&self) -> u32 {
        self.inner.set_count.load(Ordering::SeqCst)
    }

    /// Number of `compare_and_extend` calls
    pub fn extend_count(&self) -> u32 {
        self.inner.extend_count.load(Ordering::SeqCst)
    }

    /// Number of `delete` and `compare_and_delete` calls
    pub fn delete_count(&self) -> u32 {
        self.inner.delete_count.load(Ordering::SeqCst)
    }

    /// Make the next `set_if_absent` fail with a transport error
    pub fn fail_next_set(&self) {
        self.inner.fail_next_set.store(true, Ordering::SeqCst);
    }

    /// Make the next `compare_and_extend` fail with a transport error
    pub fn fail_next_extend(&self) {
        self.inner.fail_next_extend.store(true, Ordering::SeqCst);
    }
}

/// Look up a key, dropping it first if it has expired.
/// Expiry instant for `ttl`, capped where the clock cannot represent it
fn deadline(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if entries
        .get(key)
        .is_some_and(|entry| entry.expires_at <= Instant::now())
    {
        entries.remove(key);
    }
    entries.get_mut(key)
}

#[async_trait]
impl LeaseStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.inner.set_count.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_next_set.swap(false, Ordering::SeqCst) {
            return Err(StoreError::transport("set_if_absent", "injected failure"));
        }

        let mut entries = self.inner.entries.lock();
        if live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: token.to_string(),
                expires_at: deadline(ttl),
            },
        );
        Ok(true)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<Extend, StoreError> {
        self.inner.extend_count.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_next_extend.swap(false, Ordering::SeqCst) {
            return Err(StoreError::transport("compare_and_extend", "injected failure"));
        }

        let mut entries = self.inner.entries.lock();
        match live(&mut entries, key) {
            Some(entry) if entry.value == token => {
                entry.expires_at = deadline(ttl);
                Ok(Extend::Extended)
            }
            _ => Ok(Extend::NotOwner),
        }
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        self.inner.delete_count.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.inner.entries.lock();
        let owned = live(&mut entries, key).is_some_and(|entry| entry.value == token);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete_count.fetch_add(1, Ordering::SeqCst);

        let mut entries = self.inner.entries.lock();
        let existed = live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }
}
