//! The narrow capability every scanner implements.

use std::time::Duration;

use crate::error::Result;
use crate::model::{Decision, ScanContext, Violation};

/// A single inspection step over the outbound text.
///
/// Implementations must be side-effect free with respect to shared state so
/// that independent scans can run in parallel.
pub trait Scanner: Send + Sync {
    /// Stable scanner name, reported in `ScanMetadata::scanners_run`.
    fn name(&self) -> &str;

    /// Inspect `input` under `context`.
    ///
    /// # Errors
    ///
    /// A returned error aborts the enclosing chain.
    fn scan(&self, input: &str, context: &ScanContext) -> Result<ScannerOutput>;
}

/// What one scanner reports back to the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScannerOutput {
    pub decision: Decision,
    pub violations: Vec<Violation>,
    /// Replacement text, when the scanner masked something.
    pub sanitized: Option<String>,
    pub duration: Duration,
}

impl ScannerOutput {
    /// An allow result with no findings.
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn new(decision: Decision, violations: Vec<Violation>) -> Self {
        Self {
            decision,
            violations,
            sanitized: None,
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_sanitized(mut self, sanitized: String) -> Self {
        self.sanitized = Some(sanitized);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Duration in fractional milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}
