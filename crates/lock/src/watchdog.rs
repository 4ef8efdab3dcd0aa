//! Background lease renewal
//!
//! A [`Watchdog`] is bound to one held lease. Every ⅔ of the lease it runs
//! compare-and-extend with the holder's token, which leaves the last third
//! of the TTL to absorb the round-trip and scheduling jitter. Outcomes are
//! logged and broadcast but never returned to the holder; a sustained outage
//! lets the lease expire in the store while the holder still believes it
//! holds the lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::events::{EventBus, LockEvent};
use crate::store::{Extend, LeaseStore};
use crate::token::OwnerToken;

/// Time between renewals for a lease of duration `lease`: two thirds of it.
///
/// Divides first, so any `Duration` is accepted without overflow.
#[must_use]
pub fn renew_interval(lease: Duration) -> Duration {
    lease / 3 * 2
}

/// Snapshot of a watchdog's renewal outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenewalStats {
    /// Renewal calls issued
    pub attempts: u32,
    /// Calls that extended the lease
    pub extended: u32,
    /// Calls that found the key gone or owned by another token
    pub rejected: u32,
    /// Calls that failed (transport, timeout, cancellation)
    pub failed: u32,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU32,
    extended: AtomicU32,
    rejected: AtomicU32,
    failed: AtomicU32,
}

impl Counters {
    fn snapshot(&self) -> RenewalStats {
        RenewalStats {
            attempts: self.attempts.load(Ordering::SeqCst),
            extended: self.extended.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Everything the renewal task needs about the lease it keeps alive.
#[derive(Debug, Clone)]
pub(crate) struct Lease {
    pub(crate) name: String,
    pub(crate) token: OwnerToken,
    pub(crate) ttl: Duration,
    pub(crate) store: Arc<dyn LeaseStore>,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) call_timeout: Option<Duration>,
    pub(crate) events: Option<Arc<EventBus>>,
}

impl Lease {
    /// One compare-and-extend call, bounded by the call timeout and the
    /// caller's cancellation token.
    async fn renew(&self) -> Result<Extend, StoreError> {
        let call = self
            .store
            .compare_and_extend(&self.name, self.token.as_str(), self.ttl);
        let bounded = async move {
            match self.call_timeout {
                Some(timeout) => tokio::time::timeout(timeout, call)
                    .await
                    .unwrap_or_else(|_| {
                        Err(StoreError::Timeout {
                            operation: "compare_and_extend",
                            timeout,
                        })
                    }),
                None => call.await,
            }
        };

        match &self.cancel {
            Some(cancel) => tokio::select! {
                biased;
                () = cancel.cancelled() => Err(StoreError::Cancelled {
                    operation: "compare_and_extend",
                }),
                result = bounded => result,
            },
            None => bounded.await,
        }
    }

    fn emit(&self, event: LockEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

/// Handle to the renewal task of one held lease.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Watchdog {
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Watchdog {
    /// Start renewing `lease` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(lease: Lease) -> Self {
        let stop = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(run(lease, stop.clone(), Arc::clone(&counters)));
        Self {
            stop,
            task: Some(task),
            counters,
        }
    }

    /// Signal the task to stop. No renewal is issued after this returns,
    /// though one already in flight may still land.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Abort the task immediately, including an in-flight renewal.
    ///
    /// Behaves like a holder that died: the lease is neither renewed nor
    /// released and expires on its own.
    pub fn halt(&mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the renewal task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Renewal outcomes so far
    #[must_use]
    pub fn stats(&self) -> RenewalStats {
        self.counters.snapshot()
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            // A panicked or aborted task has nothing left to clean up.
            let _ = task.await;
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn run(lease: Lease, stop: CancellationToken, counters: Arc<Counters>) {
    let interval = renew_interval(lease.ttl);
    let mut consecutive_failures: u32 = 0;

    debug!(
        lock = %lease.name,
        interval_ms = interval.as_millis() as u64,
        "watchdog started"
    );

    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if stop.is_cancelled() {
            break;
        }

        counters.attempts.fetch_add(1, Ordering::SeqCst);
        match lease.renew().await {
            Ok(Extend::Extended) => {
                consecutive_failures = 0;
                counters.extended.fetch_add(1, Ordering::SeqCst);
                debug!(lock = %lease.name, lease_ms = lease.ttl.as_millis() as u64, "lease renewed");
                lease.emit(LockEvent::Renewed {
                    name: lease.name.clone(),
                });
            }
            Ok(Extend::NotOwner) => {
                consecutive_failures = 0;
                counters.rejected.fetch_add(1, Ordering::SeqCst);
                info!(lock = %lease.name, "lease not renewed: key is gone or owned by another holder");
                lease.emit(LockEvent::RenewalRejected {
                    name: lease.name.clone(),
                });
            }
            Err(error) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    lock = %lease.name,
                    error = %error,
                    consecutive_failures,
                    "lease renewal failed"
                );
                lease.emit(LockEvent::RenewalFailed {
                    name: lease.name.clone(),
                    error: error.to_string(),
                    consecutive_failures,
                });
            }
        }
    }

    debug!(lock = %lease.name, "watchdog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    fn lease_on(store: &MemoryStore, token: &str, ttl: Duration) -> Lease {
        Lease {
            name: "K".into(),
            token: OwnerToken::from_value(token),
            ttl,
            store: Arc::new(store.clone()),
            cancel: None,
            call_timeout: None,
            events: None,
        }
    }

    #[rstest]
    #[case(Duration::from_secs(10), Duration::from_millis(6666))]
    #[case(Duration::from_secs(3), Duration::from_secs(2))]
    #[case(Duration::from_millis(1500), Duration::from_secs(1))]
    fn interval_is_two_thirds_of_lease(#[case] lease: Duration, #[case] expected: Duration) {
        let interval = renew_interval(lease);
        let drift = interval.abs_diff(expected);
        assert!(drift < Duration::from_millis(1), "{interval:?} vs {expected:?}");
    }

    #[test]
    fn interval_of_largest_lease_does_not_overflow() {
        let interval = renew_interval(Duration::MAX);
        assert!(interval < Duration::MAX);
        assert!(interval > Duration::MAX / 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_renewal_before_first_interval() {
        let store = MemoryStore::new();
        store.insert("K", "a", Duration::from_secs(3));
        let watchdog = Watchdog::spawn(lease_on(&store, "a", Duration::from_secs(3)));

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(store.extend_count(), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(store.extend_count(), 1);
        assert_eq!(watchdog.stats().extended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_renewals() {
        let store = MemoryStore::new();
        store.insert("K", "a", Duration::from_secs(3));
        let watchdog = Watchdog::spawn(lease_on(&store, "a", Duration::from_secs(3)));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        watchdog.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(store.extend_count(), 1);
        assert!(!watchdog.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_not_raised() {
        let store = MemoryStore::new();
        store.insert("K", "a", Duration::from_secs(30));
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let mut lease = lease_on(&store, "a", Duration::from_secs(3));
        lease.events = Some(Arc::clone(&bus));
        let watchdog = Watchdog::spawn(lease);

        store.fail_next_extend();
        tokio::time::sleep(Duration::from_millis(2001)).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            LockEvent::RenewalFailed {
                consecutive_failures: 1,
                ..
            }
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await.unwrap(), LockEvent::Renewed { name: "K".into() });

        let stats = watchdog.stats();
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.extended, 1);
        assert!(watchdog.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_fails_calls_but_keeps_looping() {
        let store = MemoryStore::new();
        store.insert("K", "a", Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut lease = lease_on(&store, "a", Duration::from_secs(3));
        lease.cancel = Some(cancel);
        let watchdog = Watchdog::spawn(lease);

        tokio::time::sleep(Duration::from_millis(6100)).await;
        let stats = watchdog.stats();
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.failed, 3);
        assert!(watchdog.is_running());

        watchdog.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn halt_aborts_without_touching_the_key() {
        let store = MemoryStore::new();
        store.insert("K", "a", Duration::from_secs(3));
        let mut watchdog = Watchdog::spawn(lease_on(&store, "a", Duration::from_secs(3)));

        watchdog.halt();
        tokio::task::yield_now().await;
        assert!(!watchdog.is_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!store.contains("K"));
        assert_eq!(store.extend_count(), 0);
        assert_eq!(store.delete_count(), 0);
    }
}
