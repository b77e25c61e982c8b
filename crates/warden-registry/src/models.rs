//! # Core Data Models for Tool Governance
//!
//! Types shared by the tool policy scanner, manifest pinning and the pin
//! store.
//!
//! ## Threat Model
//!
//! - **Silent Surface Change**: a tool server adds a new tool after review.
//!   [`ToolManifestPin`] records the reviewed surface and [`ManifestDrift`]
//!   reports exactly what changed.
//! - **Pin Tampering**: a stored pin whose hash no longer matches its own
//!   tool list is rejected as [`RegistryError::MalformedPin`].
//!
//! ## References
//!
//! - NIST FIPS 180-4 (SHA-256)
//! - OWASP LLM07: Insecure Plugin Design

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hashed snapshot of the tool names a server exposes.
///
/// # Fields
///
/// - `server_id`: unique key of the tool-providing server
/// - `tools_hash`: hex SHA-256 of the JSON array of sorted names
/// - `tool_count`: number of names in `known_tools`
/// - `known_tools`: sorted, deduplicated names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolManifestPin {
    pub server_id: String,
    pub tools_hash: String,
    pub tool_count: usize,
    pub known_tools: Vec<String>,
    pub pinned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolManifestPin {
    /// True if `name` is part of the pinned surface.
    pub fn contains(&self, name: &str) -> bool {
        self.known_tools
            .binary_search_by(|known| known.as_str().cmp(name))
            .is_ok()
    }
}

/// Outcome of checking a candidate tool list against a pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDrift {
    pub server_id: String,
    /// True when the candidate hash equals the pinned hash.
    pub valid: bool,
    pub expected_hash: String,
    pub actual_hash: String,
    /// Names present now but not in the pin, sorted.
    pub added: Vec<String>,
    /// Names in the pin but missing now, sorted.
    pub removed: Vec<String>,
}

impl ManifestDrift {
    pub fn has_drift(&self) -> bool {
        !self.valid
    }
}

/// Per-agent tool permissions.
///
/// Deny wins over allow. An empty `allowed` list places no allow-list
/// restriction on the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPermissions {
    /// Wildcard patterns the agent may call.
    pub allowed: Vec<String>,
    /// Wildcard patterns the agent may never call.
    pub denied: Vec<String>,
    /// Deny every tool call.
    pub read_only: bool,
}

impl ToolPermissions {
    #[must_use]
    pub fn allow(mut self, pattern: impl Into<String>) -> Self {
        self.allowed.push(pattern.into());
        self
    }

    #[must_use]
    pub fn deny(mut self, pattern: impl Into<String>) -> Self {
        self.denied.push(pattern.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Tool policy scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPolicyConfig {
    /// Globally forbidden wildcard patterns. Checked before any agent rule.
    pub dangerous_patterns: Vec<String>,
    /// Deny every tool call for every agent.
    pub read_only: bool,
    /// Permission sets keyed by agent id.
    pub agent_permissions: HashMap<String, ToolPermissions>,
    /// Maximum tool calls declared in one request.
    pub max_chain_depth: usize,
    /// Manifest pins keyed by server id.
    #[serde(skip)]
    pub pins: HashMap<String, ToolManifestPin>,
}

impl Default for ToolPolicyConfig {
    fn default() -> Self {
        Self {
            dangerous_patterns: Vec::new(),
            read_only: false,
            agent_permissions: HashMap::new(),
            max_chain_depth: 5,
            pins: HashMap::new(),
        }
    }
}

impl ToolPolicyConfig {
    #[must_use]
    pub fn with_dangerous_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.dangerous_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>, permissions: ToolPermissions) -> Self {
        self.agent_permissions.insert(agent_id.into(), permissions);
        self
    }

    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_pin(mut self, pin: ToolManifestPin) -> Self {
        self.pins.insert(pin.server_id.clone(), pin);
        self
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A wildcard pattern could not be compiled.
    #[error("Invalid tool pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A pin failed its own integrity check.
    #[error("Malformed manifest pin for '{server_id}': {reason}")]
    MalformedPin { server_id: String, reason: String },

    /// No pin stored for this server.
    #[error("No manifest pin for server: {0}")]
    PinNotFound(String),
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
