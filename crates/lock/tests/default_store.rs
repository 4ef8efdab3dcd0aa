//! Process-wide default store.
//!
//! The default can be installed once per process, so the whole sequence
//! lives in one test in its own binary.

use std::sync::Arc;
use std::time::Duration;

use tether_lock::{LockError, LockOptions, Locker, MemoryStore, default_store, set_default_store};

#[tokio::test(start_paused = true)]
async fn default_store_lifecycle() {
    tether_log::try_init_test();

    // Nothing installed: handles without a store are rejected up front.
    assert!(default_store().is_none());
    let err = Locker::new("K", LockOptions::new()).unwrap_err();
    assert!(matches!(err, LockError::NoStore { ref name } if name == "K"));

    let store = MemoryStore::new();
    set_default_store(Arc::new(store.clone())).unwrap();
    assert!(default_store().is_some());

    let err = set_default_store(Arc::new(MemoryStore::new())).unwrap_err();
    assert!(matches!(err, LockError::DefaultStoreAlreadySet));

    // Refused before any connection attempt is made.
    #[cfg(feature = "redis")]
    {
        let err = tether_lock::init_default_client("127.0.0.1:1", 0, "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::DefaultStoreAlreadySet));
    }

    let mut lock = Locker::new("K", LockOptions::new()).unwrap();
    assert_eq!(lock.lease(), Duration::from_secs(10));
    assert!(lock.lock().await.unwrap());
    assert!(store.contains("K"));

    // An explicit store still wins over the default.
    let explicit = MemoryStore::new();
    let mut other = Locker::new("K", LockOptions::new().with_store(Arc::new(explicit.clone()))).unwrap();
    assert!(other.lock().await.unwrap());
    assert!(explicit.contains("K"));

    lock.unlock().await.unwrap();
    assert!(!store.contains("K"));
    assert!(explicit.contains("K"));
}
