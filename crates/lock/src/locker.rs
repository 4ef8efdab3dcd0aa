//! Lock handle
//!
//! A [`Locker`] is one named lease attempt. `lock` makes a single
//! set-if-absent attempt and, on success, starts a [`Watchdog`] that keeps
//! the lease alive. `unlock` stops the watchdog and deletes the key.
//!
//! ```text
//! Unlocked --lock()=true--> Held --unlock()--> Released
//!                            |
//!                            +-- holder dies / partitioned: key expires in the store
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{LockError, Result};
use crate::events::LockEvent;
use crate::options::{LockOptions, MAX_LEASE, MIN_LEASE, ReleaseMode};
use crate::registry;
use crate::store::LeaseStore;
use crate::token::OwnerToken;
use crate::watchdog::{Lease, RenewalStats, Watchdog};

/// Lifecycle state of a [`Locker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Never acquired, or the last attempt was contended
    Unlocked,
    /// Acquired; the watchdog is renewing the lease
    Held,
    /// `unlock` was called
    Released,
}

/// Handle to a named lease lock.
///
/// A handle is meant for a single owner: `lock` and `unlock` take
/// `&mut self`, so concurrent calls on one handle do not compile.
#[derive(Debug)]
pub struct Locker {
    name: String,
    token: OwnerToken,
    options: LockOptions,
    store: Arc<dyn LeaseStore>,
    state: LockState,
    watchdog: Option<Watchdog>,
    acquired_at: Option<Instant>,
    final_stats: RenewalStats,
}

impl Locker {
    /// Create a handle for `name`.
    ///
    /// The lease must lie within [`MIN_LEASE`]..=[`MAX_LEASE`]. Uses the
    /// options' store, or the process-wide default when none was
    /// given. Nothing is sent to the store until [`lock`](Self::lock).
    pub fn new(name: impl Into<String>, options: LockOptions) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::configuration("lock name cannot be empty"));
        }
        if !(MIN_LEASE..=MAX_LEASE).contains(&options.lease) {
            return Err(LockError::configuration(format!(
                "lease for lock '{name}' must be between {}ms and {}ms, got {:?}",
                MIN_LEASE.as_millis(),
                MAX_LEASE.as_millis(),
                options.lease
            )));
        }

        let store = match &options.store {
            Some(store) => Arc::clone(store),
            None => registry::default_store().ok_or_else(|| LockError::NoStore {
                name: name.clone(),
            })?,
        };

        Ok(Self {
            name,
            token: OwnerToken::generate(),
            options,
            store,
            state: LockState::Unlocked,
            watchdog: None,
            acquired_at: None,
            final_stats: RenewalStats::default(),
        })
    }

    /// Try once to acquire the lock.
    ///
    /// Returns `Ok(true)` when this call created the lease (the watchdog is
    /// now running) and `Ok(false)` when the name is already held. A store
    /// failure is an `Err`, never a silent `false`. There is no waiting or
    /// retrying.
    pub async fn lock(&mut self) -> Result<bool> {
        if self.state == LockState::Held {
            return Err(LockError::AlreadyHeld {
                name: self.name.clone(),
            });
        }

        let token = OwnerToken::generate();
        let created = match self
            .store
            .set_if_absent(&self.name, token.as_str(), self.options.lease)
            .await
        {
            Ok(created) => created,
            Err(error) => {
                warn!(lock = %self.name, error = %error, "lock acquisition failed");
                return Err(error.into());
            }
        };

        if !created {
            debug!(lock = %self.name, "lock is held elsewhere");
            self.state = LockState::Unlocked;
            self.emit(LockEvent::Contended {
                name: self.name.clone(),
            });
            return Ok(false);
        }

        self.token = token;
        self.state = LockState::Held;
        self.acquired_at = Some(Instant::now());
        self.final_stats = RenewalStats::default();
        self.watchdog = Some(Watchdog::spawn(Lease {
            name: self.name.clone(),
            token: self.token.clone(),
            ttl: self.options.lease,
            store: Arc::clone(&self.store),
            cancel: self.options.cancel.clone(),
            call_timeout: self.options.call_timeout,
            events: self.options.events.clone(),
        }));

        info!(
            lock = %self.name,
            lease_ms = self.options.lease.as_millis() as u64,
            "lock acquired"
        );
        self.emit(LockEvent::Acquired {
            name: self.name.clone(),
        });
        Ok(true)
    }

    /// Release the lock.
    ///
    /// Stops the watchdog, then removes the key according to the
    /// [`ReleaseMode`]. With the default `Unconditional` mode the key is
    /// deleted even if it now belongs to another holder, including when this
    /// handle never acquired it. Calling `unlock` again repeats the delete.
    ///
    /// The handle is `Released` even if the delete fails; the lease then
    /// expires on its own.
    pub async fn unlock(&mut self) -> Result<()> {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
            self.final_stats = watchdog.stats();
        }
        let held_for = self
            .acquired_at
            .take()
            .map(|at| at.elapsed())
            .unwrap_or_default();
        self.state = LockState::Released;

        let removed = match self.options.release {
            ReleaseMode::Unconditional => self.store.delete(&self.name).await,
            ReleaseMode::OwnerChecked => {
                self.store
                    .compare_and_delete(&self.name, self.token.as_str())
                    .await
            }
        }
        .inspect_err(|error| {
            warn!(lock = %self.name, error = %error, "lock release failed");
        })?;

        info!(
            lock = %self.name,
            removed,
            held_ms = held_for.as_millis() as u64,
            "lock released"
        );
        self.emit(LockEvent::Released {
            name: self.name.clone(),
            held_for,
        });
        Ok(())
    }

    /// Abort the watchdog without releasing, as if the holder had died.
    ///
    /// The handle still reports `Held`; the lease expires in the store one
    /// lease after its last renewal.
    pub fn halt_renewal(&mut self) {
        if let Some(watchdog) = &mut self.watchdog {
            watchdog.halt();
            warn!(lock = %self.name, "lease renewal halted without release");
        }
    }

    /// The lock name (the store key)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token written by the last successful acquisition
    #[must_use]
    pub fn token(&self) -> &OwnerToken {
        &self.token
    }

    /// Configured lease duration
    #[must_use]
    pub fn lease(&self) -> Duration {
        self.options.lease
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Whether the handle believes it holds the lock.
    ///
    /// This is local knowledge only; the lease may have expired in the store
    /// if renewals have been failing.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }

    /// Whether the watchdog task is running
    #[must_use]
    pub fn is_renewing(&self) -> bool {
        self.watchdog.as_ref().is_some_and(Watchdog::is_running)
    }

    /// Renewal outcomes of the current or most recent hold
    #[must_use]
    pub fn renewal_stats(&self) -> RenewalStats {
        self.watchdog
            .as_ref()
            .map_or(self.final_stats, Watchdog::stats)
    }

    fn emit(&self, event: LockEvent) {
        if let Some(bus) = &self.options.events {
            bus.emit(event);
        }
    }
}

impl Drop for Locker {
    fn drop(&mut self) {
        if self.state == LockState::Held {
            debug!(lock = %self.name, "lock handle dropped while held; lease will expire");
        }
    }
}
