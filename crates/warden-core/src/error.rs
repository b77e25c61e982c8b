//! Error types for LLM Warden Core.

use thiserror::Error;

/// Core error type for warden operations.
///
/// A `block` decision or a denied budget check is never an error. These
/// variants are genuine faults: bad configuration, a broken store or a
/// failing scanner.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Preset lookup or scanner chain failure.
    #[error("Policy error: {0}")]
    Policy(#[from] warden_policy::PolicyError),

    /// Heuristic or PII scanner construction failure.
    #[error("Firewall error: {0}")]
    Firewall(#[from] warden_firewall::FirewallError),

    /// Tool policy, pin or pin store failure.
    #[error("Registry error: {0}")]
    Registry(#[from] warden_registry::RegistryError),

    /// Budget store or audit failure.
    #[error("Monitor error: {0}")]
    Monitor(#[from] warden_monitor::MonitorError),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing a configuration file failed.
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}
