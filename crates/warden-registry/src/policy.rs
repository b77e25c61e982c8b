//! # Tool Policy Scanner
//!
//! Enforces tool permissions and manifest integrity over the tool calls a
//! caller declares in [`ScanContext::tools`].
//!
//! ## Checks per tool call
//!
//! ```text
//!  ┌──────────────┐  match  ┌─────────────┐
//!  │  dangerous?  │────────▶│ tool_denied │
//!  └──────┬───────┘         └─────────────┘
//!         │ no                     ▲
//!  ┌──────▼───────┐  yes           │
//!  │  read-only?  │────────────────┤
//!  └──────┬───────┘                │
//!  ┌──────▼───────┐  deny / !allow │
//!  │ agent perms  │────────────────┘
//!  └──────────────┘
//!
//!  independently: server pinned and name not in pin ─▶ manifest_drift
//! ```
//!
//! Dangerous patterns win over an agent's allow-list. Drift is reported
//! regardless of permissions. The request-level check adds a
//! `tool_rate_limit` violation when more calls are declared than the
//! configured chain depth.
//!
//! ## Decision
//!
//! There is no partial allow: any violation makes the result `block`.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};

use warden_policy::{
    Decision, ScanContext, Scanner, ScannerOutput, ToolCall, Violation, ViolationCategory,
};

use crate::manifest::validate_pin;
use crate::models::{Result, ToolManifestPin, ToolPolicyConfig};
use crate::wildcard::{compile_all, Wildcard};

/// Name reported in `scanners_run`.
pub const SCANNER_NAME: &str = "tool_policy";

struct CompiledPermissions {
    allowed: Vec<Wildcard>,
    denied: Vec<Wildcard>,
    read_only: bool,
}

/// Permission and manifest-integrity scanner.
pub struct ToolPolicyScanner {
    dangerous: Vec<Wildcard>,
    read_only: bool,
    agents: HashMap<String, CompiledPermissions>,
    max_chain_depth: usize,
    pins: HashMap<String, ToolManifestPin>,
}

impl ToolPolicyScanner {
    /// Compile the configuration.
    ///
    /// # Errors
    ///
    /// Fails on an invalid wildcard pattern or a malformed pin.
    pub fn new(config: ToolPolicyConfig) -> Result<Self> {
        for pin in config.pins.values() {
            validate_pin(pin)?;
        }

        let mut agents = HashMap::with_capacity(config.agent_permissions.len());
        for (agent, perms) in &config.agent_permissions {
            agents.insert(
                agent.clone(),
                CompiledPermissions {
                    allowed: compile_all(&perms.allowed)?,
                    denied: compile_all(&perms.denied)?,
                    read_only: perms.read_only,
                },
            );
        }

        debug!(
            dangerous = config.dangerous_patterns.len(),
            agents = agents.len(),
            pins = config.pins.len(),
            max_chain_depth = config.max_chain_depth,
            "tool policy scanner ready"
        );

        Ok(Self {
            dangerous: compile_all(&config.dangerous_patterns)?,
            read_only: config.read_only,
            agents,
            max_chain_depth: config.max_chain_depth,
            pins: config.pins,
        })
    }

    pub fn pin(&self, server_id: &str) -> Option<&ToolManifestPin> {
        self.pins.get(server_id)
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    fn denial(tool: &ToolCall, message: String) -> Violation {
        Violation::new(ViolationCategory::ToolDenied, SCANNER_NAME, 1.0, 1.0, message)
            .with_detail(tool.name.clone())
    }

    /// Permission check: at most one `tool_denied` per call.
    fn check_permissions(&self, tool: &ToolCall, agent: Option<&str>) -> Option<Violation> {
        let name = tool.name.as_str();

        if self.dangerous.iter().any(|p| p.matches(name)) {
            return Some(Self::denial(
                tool,
                format!("Tool '{}' matches a dangerous pattern", name),
            ));
        }

        if self.read_only {
            return Some(Self::denial(tool, format!("Tool '{}' denied: read-only mode", name)));
        }

        let perms = agent.and_then(|a| self.agents.get(a))?;
        let agent = agent.unwrap_or_default();

        if perms.read_only {
            return Some(Self::denial(
                tool,
                format!("Tool '{}' denied: agent '{}' is read-only", name, agent),
            ));
        }
        if perms.denied.iter().any(|p| p.matches(name)) {
            return Some(Self::denial(
                tool,
                format!("Tool '{}' is denied for agent '{}'", name, agent),
            ));
        }
        if !perms.allowed.is_empty() && !perms.allowed.iter().any(|p| p.matches(name)) {
            return Some(Self::denial(
                tool,
                format!("Tool '{}' is not allowed for agent '{}'", name, agent),
            ));
        }
        None
    }

    fn check_manifest(&self, tool: &ToolCall) -> Option<Violation> {
        let server_id = tool.server_id.as_deref()?;
        let pin = self.pins.get(server_id)?;
        if pin.contains(&tool.name) {
            return None;
        }
        Some(
            Violation::new(
                ViolationCategory::ManifestDrift,
                SCANNER_NAME,
                1.0,
                1.0,
                format!(
                    "Tool '{}' is not in the pinned manifest of server '{}'",
                    tool.name, server_id
                ),
            )
            .with_detail(format!("{}/{}", server_id, tool.name)),
        )
    }
}

impl Scanner for ToolPolicyScanner {
    fn name(&self) -> &str {
        SCANNER_NAME
    }

    fn scan(&self, _input: &str, context: &ScanContext) -> warden_policy::Result<ScannerOutput> {
        let started = Instant::now();
        if !context.has_tools() {
            return Ok(ScannerOutput::allow().with_duration(started.elapsed()));
        }

        let agent = context.agent_id.as_deref();
        let mut violations = Vec::new();

        if context.tools.len() > self.max_chain_depth {
            violations.push(Violation::new(
                ViolationCategory::ToolRateLimit,
                SCANNER_NAME,
                context.tools.len() as f64,
                self.max_chain_depth as f64,
                format!(
                    "{} tool calls exceed the maximum chain depth of {}",
                    context.tools.len(),
                    self.max_chain_depth
                ),
            ));
        }

        for tool in &context.tools {
            violations.extend(self.check_permissions(tool, agent));
            violations.extend(self.check_manifest(tool));
        }

        let decision = if violations.is_empty() {
            Decision::Allow
        } else {
            warn!(
                agent = agent.unwrap_or("-"),
                tools = context.tools.len(),
                violations = violations.len(),
                "tool policy violation"
            );
            Decision::Block
        };

        Ok(ScannerOutput::new(decision, violations).with_duration(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::pin_manifest;
    use crate::models::ToolPermissions;

    fn ctx(agent: &str, tools: &[&str]) -> ScanContext {
        tools
            .iter()
            .fold(ScanContext::new().with_agent(agent), |c, t| c.with_tool(ToolCall::new(*t)))
    }

    fn categories(out: &ScannerOutput) -> Vec<ViolationCategory> {
        out.violations.iter().map(|v| v.category).collect()
    }

    #[test]
    fn test_no_tools_allows() {
        let s = ToolPolicyScanner::new(ToolPolicyConfig::default()).unwrap();
        let out = s.scan("hi", &ScanContext::new()).unwrap();
        assert_eq!(out.decision, Decision::Allow);
    }

    #[test]
    fn test_allowed_tool_passes() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default().with_agent("bot", ToolPermissions::default().allow("read_*")),
        )
        .unwrap();
        let out = s.scan("", &ctx("bot", &["read_file"])).unwrap();
        assert_eq!(out.decision, Decision::Allow);
    }

    #[test]
    fn test_not_in_allow_list_denied() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default().with_agent("bot", ToolPermissions::default().allow("read_*")),
        )
        .unwrap();
        let out = s.scan("", &ctx("bot", &["write_file"])).unwrap();
        assert_eq!(out.decision, Decision::Block);
        assert_eq!(categories(&out), vec![ViolationCategory::ToolDenied]);
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let s = ToolPolicyScanner::new(ToolPolicyConfig::default().with_agent(
            "bot",
            ToolPermissions::default().allow("*").deny("secret_*"),
        ))
        .unwrap();
        assert!(s.scan("", &ctx("bot", &["secret_read"])).unwrap().decision.is_blocked());
        assert!(s.scan("", &ctx("bot", &["public_read"])).unwrap().decision.is_allowed());
    }

    #[test]
    fn test_unknown_agent_only_global_rules() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default()
                .with_dangerous_pattern("exec*")
                .with_agent("bot", ToolPermissions::default().allow("read_*")),
        )
        .unwrap();
        assert!(s.scan("", &ctx("other", &["write_file"])).unwrap().decision.is_allowed());
        assert!(s.scan("", &ctx("other", &["exec_cmd"])).unwrap().decision.is_blocked());
    }

    #[test]
    fn test_read_only_denies_everything() {
        let s = ToolPolicyScanner::new(ToolPolicyConfig::default().with_read_only(true)).unwrap();
        let out = s.scan("", &ctx("bot", &["read_file", "list"])).unwrap();
        assert_eq!(out.violations.len(), 2);

        let agent_ro = ToolPolicyScanner::new(
            ToolPolicyConfig::default().with_agent("viewer", ToolPermissions::default().read_only()),
        )
        .unwrap();
        assert!(agent_ro.scan("", &ctx("viewer", &["read_file"])).unwrap().decision.is_blocked());
    }

    #[test]
    fn test_chain_depth_exceeded() {
        let s = ToolPolicyScanner::new(ToolPolicyConfig::default().with_max_chain_depth(2)).unwrap();
        let out = s.scan("", &ctx("bot", &["a", "b", "c"])).unwrap();
        assert_eq!(out.decision, Decision::Block);
        assert_eq!(categories(&out), vec![ViolationCategory::ToolRateLimit]);

        let ok = s.scan("", &ctx("bot", &["a", "b"])).unwrap();
        assert_eq!(ok.decision, Decision::Allow);
    }

    #[test]
    fn test_pattern_metacharacters_compile() {
        let s = ToolPolicyScanner::new(ToolPolicyConfig::default().with_dangerous_pattern("[a*"))
            .unwrap();
        assert!(s.scan("", &ctx("bot", &["[admin"])).unwrap().decision.is_blocked());
        assert!(s.scan("", &ctx("bot", &["admin"])).unwrap().decision.is_allowed());
    }

    // =========================================================================
    // Security-focused tests
    // =========================================================================

    #[test]
    fn test_dangerous_pattern_beats_allow_list() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default()
                .with_dangerous_pattern("*delete*")
                .with_agent("admin", ToolPermissions::default().allow("bulk_delete")),
        )
        .unwrap();
        let out = s.scan("", &ctx("admin", &["bulk_delete"])).unwrap();
        assert_eq!(out.decision, Decision::Block);
        assert!(out.violations[0].message.contains("dangerous"));
    }

    #[test]
    fn test_mixed_case_names_hit_dangerous_and_deny_rules() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default()
                .with_dangerous_pattern("*delete*")
                .with_agent("bot", ToolPermissions::default().allow("*").deny("secret_*")),
        )
        .unwrap();
        let out = s.scan("", &ctx("bot", &["Delete_User"])).unwrap();
        assert_eq!(out.decision, Decision::Block);
        assert!(out.violations[0].message.contains("dangerous"));

        assert!(s.scan("", &ctx("bot", &["SECRET_read"])).unwrap().decision.is_blocked());
        assert!(s.scan("", &ctx("bot", &["Public_Read"])).unwrap().decision.is_allowed());
    }

    #[test]
    fn test_manifest_drift_regardless_of_permissions() {
        let pin = pin_manifest("files", &["read", "write"]).unwrap();
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default()
                .with_pin(pin)
                .with_agent("bot", ToolPermissions::default().allow("*")),
        )
        .unwrap();

        let context = ScanContext::new()
            .with_agent("bot")
            .with_tool(ToolCall::new("read").from_server("files"))
            .with_tool(ToolCall::new("upload_everything").from_server("files"));
        let out = s.scan("", &context).unwrap();
        assert_eq!(out.decision, Decision::Block);
        assert_eq!(categories(&out), vec![ViolationCategory::ManifestDrift]);
        assert_eq!(out.violations[0].detail.as_deref(), Some("files/upload_everything"));
    }

    #[test]
    fn test_unpinned_server_not_checked() {
        let s = ToolPolicyScanner::new(
            ToolPolicyConfig::default().with_pin(pin_manifest("files", &["read"]).unwrap()),
        )
        .unwrap();
        let context = ScanContext::new().with_tool(ToolCall::new("anything").from_server("other"));
        assert!(s.scan("", &context).unwrap().decision.is_allowed());
    }

    #[test]
    fn test_malformed_pin_fails_construction() {
        let mut pin = pin_manifest("files", &["read"]).unwrap();
        pin.tool_count = 5;
        let result = ToolPolicyScanner::new(ToolPolicyConfig::default().with_pin(pin));
        assert!(matches!(
            result,
            Err(crate::models::RegistryError::MalformedPin { .. })
        ));
    }
}
