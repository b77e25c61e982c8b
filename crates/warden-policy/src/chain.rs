//! # Scanner Chain
//!
//! Runs an ordered list of scanners over one input and folds their outputs
//! into a single [`ScanResult`].
//!
//! ```text
//!  input ──▶ [scanner 1] ──sanitized──▶ [scanner 2] ──sanitized──▶ [scanner 3]
//!                │                          │                          │
//!                └──────── violations, decision (escalate only) ───────┘
//! ```
//!
//! - Sanitization composes: each scanner sees the previous scanner's output.
//! - The running decision only escalates (`allow < warn < block`).
//! - With early exit on, the chain stops at the first `block`. Later scanners
//!   never see the remaining text, so callers that rely on full-chain masking
//!   must disable early exit.
//! - A scanner error aborts the chain and is returned as-is.

use std::time::Instant;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Decision, ScanContext, ScanMetadata, ScanResult};
use crate::scanner::Scanner;

/// Ordered, homogeneous collection of scanners.
pub struct ScannerChain {
    scanners: Vec<Box<dyn Scanner>>,
    early_exit: bool,
}

impl ScannerChain {
    /// Empty chain with early exit enabled.
    pub fn new() -> Self {
        Self {
            scanners: Vec::new(),
            early_exit: true,
        }
    }

    /// Enable or disable early exit on `block`.
    #[must_use]
    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }

    /// Append a scanner.
    #[must_use]
    pub fn with_scanner(mut self, scanner: impl Scanner + 'static) -> Self {
        self.push(Box::new(scanner));
        self
    }

    /// Append a boxed scanner.
    pub fn push(&mut self, scanner: Box<dyn Scanner>) {
        self.scanners.push(scanner);
    }

    pub fn early_exit(&self) -> bool {
        self.early_exit
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Registered scanner names, in order.
    pub fn scanner_names(&self) -> Vec<String> {
        self.scanners.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every scanner in order and aggregate the results.
    ///
    /// # Errors
    ///
    /// Propagates the first scanner error; no partial result is returned.
    pub fn run(&self, input: &str, context: &ScanContext) -> Result<ScanResult> {
        let started = Instant::now();
        let mut current = input.to_string();
        let mut decision = Decision::Allow;
        let mut violations = Vec::new();
        let mut scanners_run = Vec::with_capacity(self.scanners.len());

        for scanner in &self.scanners {
            let name = scanner.name().to_string();
            let output = scanner.scan(&current, context).map_err(|e| {
                warn!(scanner = %name, error = %e, "scanner failed, aborting chain");
                e
            })?;
            scanners_run.push(name);

            debug!(
                scanner = scanner.name(),
                decision = %output.decision,
                violations = output.violations.len(),
                duration_ms = output.duration_ms(),
                "scanner finished"
            );

            violations.extend(output.violations);
            if let Some(sanitized) = output.sanitized {
                current = sanitized;
            }
            decision = decision.escalate(output.decision);

            if self.early_exit && decision.is_blocked() {
                debug!(scanner = scanner.name(), "early exit on block");
                break;
            }
        }

        let metadata = ScanMetadata {
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            scanners_run,
            cached: false,
        };

        Ok(ScanResult::new(decision, current, violations, metadata))
    }
}

impl Default for ScannerChain {
    fn default() -> Self {
        Self::new()
    }
}
