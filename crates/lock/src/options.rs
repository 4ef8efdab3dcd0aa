//! Per-handle lock configuration

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::events::EventBus;
use crate::store::LeaseStore;

/// Lease duration used when none is configured
pub const DEFAULT_LEASE: Duration = Duration::from_secs(10);

/// Shortest lease a [`Locker`](crate::Locker) accepts; stores expire in whole milliseconds
pub const MIN_LEASE: Duration = Duration::from_millis(1);

/// Longest lease a [`Locker`](crate::Locker) accepts, the largest TTL Redis takes in `PX`
pub const MAX_LEASE: Duration = Duration::from_millis(i64::MAX as u64);

/// How `unlock` removes the lease key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Delete the key whatever it holds.
    ///
    /// If this handle's lease already expired and another holder took the
    /// name, that holder's lease is deleted.
    #[default]
    Unconditional,
    /// Delete the key only while it still holds this handle's token
    OwnerChecked,
}

/// Configuration for a [`Locker`](crate::Locker).
///
/// Every field is independently optional:
///
/// | Field | Default |
/// |---|---|
/// | lease | [`DEFAULT_LEASE`] (10s) |
/// | store | the process-wide default store |
/// | cancellation | none, renewal calls are not cancelable |
/// | call timeout | none |
/// | release mode | [`ReleaseMode::Unconditional`] |
/// | events | none |
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub(crate) lease: Duration,
    pub(crate) store: Option<Arc<dyn LeaseStore>>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) call_timeout: Option<Duration>,
    pub(crate) release: ReleaseMode,
    pub(crate) events: Option<Arc<EventBus>>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease: DEFAULT_LEASE,
            store: None,
            cancel: None,
            call_timeout: None,
            release: ReleaseMode::default(),
            events: None,
        }
    }
}

impl LockOptions {
    /// Options with every field at its default
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL of the lease, per acquisition and per renewal
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Store to talk to instead of the process-wide default
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn LeaseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Token that cancels individual renewal calls.
    ///
    /// Cancelling it fails in-flight and future renewals; it does not stop
    /// the watchdog, which keeps trying until the handle is released.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Deadline for each individual renewal call
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// How `unlock` removes the lease key
    #[must_use]
    pub fn with_release_mode(mut self, mode: ReleaseMode) -> Self {
        self.release = mode;
        self
    }

    /// Bus that receives acquisition, renewal and release events
    #[must_use]
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Configured lease duration
    #[must_use]
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Configured release mode
    #[must_use]
    pub fn release_mode(&self) -> ReleaseMode {
        self.release
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn defaults() {
        let options = LockOptions::default();
        assert_eq!(options.lease(), Duration::from_secs(10));
        assert_eq!(options.release_mode(), ReleaseMode::Unconditional);
        assert!(options.store.is_none());
        assert!(options.cancel.is_none());
        assert!(options.call_timeout.is_none());
        assert!(options.events.is_none());
    }

    #[test]
    fn fields_are_independently_overridable() {
        let options = LockOptions::new()
            .with_lease(Duration::from_secs(2))
            .with_store(Arc::new(MemoryStore::new()));
        assert_eq!(options.lease(), Duration::from_secs(2));
        assert!(options.store.is_some());
        assert!(options.cancel.is_none());

        let options = LockOptions::new().with_release_mode(ReleaseMode::OwnerChecked);
        assert_eq!(options.lease(), DEFAULT_LEASE);
        assert_eq!(options.release_mode(), ReleaseMode::OwnerChecked);
    }
}
