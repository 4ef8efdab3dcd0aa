//! Event broadcasting for lock lifecycle observability.
//!
//! Renewal outcomes never reach the lock holder as errors. Subscribers of an
//! [`EventBus`] can still tell a lost lease ([`LockEvent::RenewalRejected`])
//! apart from a store that stopped answering ([`LockEvent::RenewalFailed`]).

use std::time::Duration;

use tokio::sync::broadcast;

/// Events emitted by lock handles and their watchdogs.
///
/// All variants carry the lock `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// The handle created the lease key.
    Acquired {
        /// The lock name.
        name: String,
    },
    /// The lease key already existed; the handle did not acquire it.
    Contended {
        /// The lock name.
        name: String,
    },
    /// The watchdog extended the lease.
    Renewed {
        /// The lock name.
        name: String,
    },
    /// The lease key is gone or owned by another token; nothing was extended.
    RenewalRejected {
        /// The lock name.
        name: String,
    },
    /// The renewal call itself failed (transport, timeout, cancellation).
    RenewalFailed {
        /// The lock name.
        name: String,
        /// Human-readable error description.
        error: String,
        /// Failures in a row, including this one.
        consecutive_failures: u32,
    },
    /// The handle released the lock.
    Released {
        /// The lock name.
        name: String,
        /// How long the lease was held; zero if it never was.
        held_for: Duration,
    },
}

impl LockEvent {
    /// The lock name this event belongs to
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Acquired { name }
            | Self::Contended { name }
            | Self::Renewed { name }
            | Self::RenewalRejected { name }
            | Self::RenewalFailed { name, .. }
            | Self::Released { name, .. } => name,
        }
    }
}

/// Broadcast-based event bus for lock events.
///
/// Emission is fire-and-forget: with no subscribers, or a full channel, events
/// are dropped and the emitter never waits.
pub struct EventBus {
    sender: broadcast::Sender<LockEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: LockEvent) {
        // Err only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
