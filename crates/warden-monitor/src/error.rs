//! Error types for spend control and audit.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur in the cost tracker, budget stores and audit sinks.
///
/// # Security Notes
///
/// Budget-store errors always reach the caller: an unreliable counter store
/// must never be mistaken for "no spend". Audit-sink errors are handled
/// inside [`crate::AuditLogger`] and never reach the scan path.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The counter or audit store failed.
    #[error("store error: {0}")]
    Store(String),

    /// A stored counter did not parse as a number.
    #[error("corrupt counter at '{key}': {value}")]
    CorruptCounter {
        /// Store key
        key: String,
        /// Raw stored value
        value: String,
    },

    /// Budget or pricing configuration is inconsistent.
    #[error("invalid budget for '{entity}': {reason}")]
    InvalidBudget {
        /// Entity the budget belongs to
        entity: String,
        /// What is wrong with it
        reason: String,
    },

    /// The component was closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Serialization of an audit record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing to an audit sink failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Redis command failed.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl MonitorError {
    /// Wrap a poisoned lock or similar local failure.
    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store(message.to_string())
    }
}
