//! # Warden Registry - Tool Governance
//!
//! Controls which tools an agent may call and detects when a tool server
//! silently changes the set of tools it exposes.
//!
//! ## Purpose
//!
//! 1. **Tool Policy** - Global dangerous-pattern list, per-agent allow/deny
//!    wildcards, read-only mode and a cap on tool calls per request.
//!
//! 2. **Manifest Pinning** - A SHA-256 snapshot of a server's sorted tool
//!    names. Any call to a tool outside the pinned set is `manifest_drift`.
//!
//! 3. **Persistent Pins** - Sled-backed storage so pins survive restarts.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Rug Pull | Server adds a destructive tool after review | Manifest pin |
//! | Shadow Server | Another server claims a trusted tool name | Per-server pins |
//! | Privilege Creep | Agent calls tools outside its role | Allow/deny wildcards |
//! | Destructive Calls | `delete`, `exec`, `sudo` style tools | Dangerous patterns |
//! | Tool Chaining | Long sequences of tool calls in one request | Chain depth limit |
//! | Pin Tampering | Pin edited at rest | Hash recomputation on load |
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    TOOL REGISTRY                          │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐          ┌──────────────────────┐   │
//! │  │ TOOL POLICY      │   pins   │  MANIFEST PINS       │   │
//! │  │ SCANNER          │◀─────────│                      │   │
//! │  │                  │          │  sorted names        │   │
//! │  │ • dangerous      │          │  → JSON → SHA-256    │   │
//! │  │ • read-only      │          │  verify: added /     │   │
//! │  │ • allow / deny   │          │          removed     │   │
//! │  │ • chain depth    │          └──────────┬───────────┘   │
//! │  │ • drift          │                     │               │
//! │  └──────────────────┘          ┌──────────▼───────────┐   │
//! │                                │  SLED PIN STORE      │   │
//! │                                └──────────────────────┘   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## References
//!
//! - OWASP LLM07: Insecure Plugin Design, LLM08: Excessive Agency
//!   <https://owasp.org/www-project-top-10-for-large-language-model-applications/>
//! - NIST FIPS 180-4 - SHA-256
//! - Sled Documentation <https://sled.rs/>
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_policy::{ScanContext, Scanner, ToolCall};
//! use warden_registry::{pin_manifest, ToolPermissions, ToolPolicyConfig, ToolPolicyScanner};
//!
//! let pin = pin_manifest("files", &["read_file", "list_dir"]).unwrap();
//! let scanner = ToolPolicyScanner::new(
//!     ToolPolicyConfig::default()
//!         .with_dangerous_pattern("*delete*")
//!         .with_agent("support", ToolPermissions::default().allow("read_*"))
//!         .with_pin(pin),
//! )
//! .unwrap();
//!
//! let ctx = ScanContext::new()
//!     .with_agent("support")
//!     .with_tool(ToolCall::new("read_file").from_server("files"));
//! assert!(scanner.scan("", &ctx).unwrap().decision.is_allowed());
//! ```
//!
//! ## Security Considerations
//!
//! - Dangerous patterns are checked before agent permissions, so an allow
//!   list can never re-enable them
//! - Drift is checked independently of permissions
//! - A malformed pin fails construction instead of being ignored

pub mod manifest;
pub mod models;
pub mod policy;
pub mod storage;
pub mod wildcard;

#[cfg(test)]
mod tests;

pub use manifest::{hash_tools, pin_manifest, repin, validate_pin, verify_manifest};
pub use models::{
    ManifestDrift, RegistryError, Result, ToolManifestPin, ToolPermissions, ToolPolicyConfig,
};
pub use policy::ToolPolicyScanner;
pub use storage::PinStore;
pub use wildcard::{wildcard_match, Wildcard};
