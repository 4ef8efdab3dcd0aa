//! Error types for lease locking
use std::time::Duration;

use thiserror::Error;

/// Result type for lock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Failure of a single call against a [`LeaseStore`](crate::store::LeaseStore).
///
/// Contention is never a `StoreError`: a key that already exists is the
/// `Ok(false)` of `set_if_absent`, and a lease owned by someone else is
/// [`Extend::NotOwner`](crate::store::Extend::NotOwner).
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Connection, I/O or protocol failure talking to the store
    #[error("store transport error during {operation}: {message}")]
    Transport {
        /// The store operation that failed
        operation: &'static str,
        /// The underlying error, rendered
        message: String,
    },

    /// The call did not complete within its deadline
    #[error("store call {operation} timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// The store operation that timed out
        operation: &'static str,
        /// The deadline that elapsed
        timeout: Duration,
    },

    /// The caller's cancellation token fired before the call completed
    #[error("store call {operation} was cancelled")]
    Cancelled {
        /// The store operation that was cancelled
        operation: &'static str,
    },

    /// The store replied with a value the protocol does not allow
    #[error("unexpected reply to {operation}: {reply}")]
    Unexpected {
        /// The store operation
        operation: &'static str,
        /// The reply, rendered
        reply: String,
    },
}

impl StoreError {
    /// Create a transport error
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// The store operation this error belongs to
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Cancelled { operation }
            | Self::Unexpected { operation, .. } => *operation,
        }
    }
}

/// Error type for lock handle operations
#[derive(Error, Debug, Clone)]
pub enum LockError {
    /// Handle or store configuration is invalid
    #[error("configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// No store was given and no process-wide default is installed
    #[error("no store configured for lock '{name}' and no default store installed")]
    NoStore {
        /// The lock name
        name: String,
    },

    /// The process-wide default store was already installed
    #[error("default store is already set")]
    DefaultStoreAlreadySet,

    /// `lock` was called on a handle that already holds its lease
    #[error("lock '{name}' is already held by this handle")]
    AlreadyHeld {
        /// The lock name
        name: String,
    },

    /// The store call failed; distinct from ordinary contention
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LockError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if retrying the same call could succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Transport { .. } | StoreError::Timeout { .. })
        )
    }
}
