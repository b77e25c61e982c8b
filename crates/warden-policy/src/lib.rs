//! # Warden Policy - Decision Model and Scanner Chain
//!
//! Leaf crate of the workspace. Defines the vocabulary every scanner speaks,
//! the [`Scanner`] capability, the [`ScannerChain`] that sequences scanners,
//! and the preset-driven [`PolicyEngine`].
//!
//! ## Decision Model
//!
//! | Decision | `safe` | Meaning |
//! |----------|--------|---------|
//! | `allow`  | true   | Nothing reached the warning level |
//! | `warn`   | true   | Findings recorded, request may proceed |
//! | `block`  | false  | Request must not be forwarded |
//!
//! Decisions are totally ordered and only ever escalate inside one scan.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_policy::{ScanContext, ScannerChain};
//!
//! let chain = ScannerChain::new()
//!     .with_scanner(heuristic)
//!     .with_scanner(pii)
//!     .with_scanner(tools);
//!
//! let result = chain.run("summarise this thread", &ScanContext::new())?;
//! if result.is_blocked() {
//!     reject(result.reason());
//! }
//! ```
//!
//! ## Security Notes
//!
//! - A `block` is a normal outcome, never an error
//! - Scanner failures abort the chain instead of yielding a partial result
//! - Unknown preset names fail at construction

pub mod chain;
pub mod error;
pub mod model;
pub mod presets;
pub mod scanner;

pub use chain::ScannerChain;
pub use error::{PolicyError, Result};
pub use model::{
    Decision, InjectionAction, PiiAction, PiiType, ScanContext, ScanMetadata, ScanResult,
    Strictness, ToolCall, Violation, ViolationCategory,
};
pub use presets::{PolicyEngine, Preset, PresetName};
pub use scanner::{Scanner, ScannerOutput};
