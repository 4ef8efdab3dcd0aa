//! Error types for logger setup

use thiserror::Error;

/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup and reload failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The filter directive string does not parse
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// The rejected directive string
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Swapping the filter of a running logger failed
    #[error("failed to reload filter: {0}")]
    Reload(String),

    /// A global subscriber is already installed
    #[error("logger already initialized: {0}")]
    AlreadyInitialized(String),
}
