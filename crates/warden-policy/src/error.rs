//! Error types for the policy layer.

use thiserror::Error;

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors raised while resolving policy or running a scanner chain.
///
/// A `block` decision is never an error. These variants describe genuine
/// faults: bad configuration, or a scanner that could not complete.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The requested preset name is not one of the known presets.
    #[error("unknown preset: '{0}' (expected strict, moderate or relaxed)")]
    UnknownPreset(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A scanner failed mid-chain. The remaining scanners were not run.
    #[error("scanner '{scanner}' failed: {message}")]
    Scanner {
        /// Name of the failing scanner.
        scanner: String,
        /// Description of the failure.
        message: String,
    },
}

impl PolicyError {
    /// Convenience constructor for scanner failures.
    pub fn scanner(scanner: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Scanner {
            scanner: scanner.into(),
            message: message.to_string(),
        }
    }
}
