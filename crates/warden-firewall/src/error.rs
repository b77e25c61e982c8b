//! Error types for the firewall scanners.

use thiserror::Error;

/// Result type alias for firewall construction.
pub type Result<T> = std::result::Result<T, FirewallError>;

/// Errors raised while building a firewall scanner.
///
/// Scanning itself never fails: every construction-time input (rule
/// patterns, thresholds, weights) is validated up front.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// A built-in or custom pattern did not compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Threshold outside `(0, 1]`.
    #[error("threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Custom rule weight outside `[0, 1]`.
    #[error("rule '{rule}' has weight {weight}, expected [0, 1]")]
    InvalidWeight { rule: String, weight: f64 },
}
