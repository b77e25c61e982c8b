//! Shared vocabulary for every scanner: decisions, violations, the per-call
//! scan context and the aggregated scan result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// Tri-state outcome of a scan.
///
/// Variants are declared in severity order so the derived `Ord` gives the
/// total order `Allow < Warn < Block` used for escalation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// No finding reached the warning level.
    #[default]
    Allow,
    /// Findings were recorded but the request may proceed.
    Warn,
    /// The request must not be forwarded.
    Block,
}

impl Decision {
    /// Returns the more severe of the two decisions. Never downgrades.
    #[inline]
    #[must_use]
    pub fn escalate(self, other: Decision) -> Decision {
        self.max(other)
    }

    /// Returns true if this is a Block decision.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block)
    }

    /// Returns true if this is an Allow decision.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    /// Heuristic prompt-injection rule matched.
    PromptInjection,
    /// Personally identifiable information found in the input.
    PiiDetected,
    /// A declared tool call is not permitted.
    ToolDenied,
    /// Too many tool calls declared in one request.
    ToolRateLimit,
    /// Spend limit reached.
    BudgetExceeded,
    /// Generic content rule.
    ContentPolicy,
    /// A tool name is missing from its server's pinned manifest.
    ManifestDrift,
}

impl ViolationCategory {
    /// Snake-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromptInjection => "prompt_injection",
            Self::PiiDetected => "pii_detected",
            Self::ToolDenied => "tool_denied",
            Self::ToolRateLimit => "tool_rate_limit",
            Self::BudgetExceeded => "budget_exceeded",
            Self::ContentPolicy => "content_policy",
            Self::ManifestDrift => "manifest_drift",
        }
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding emitted by a scanner. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// What kind of finding this is.
    pub category: ViolationCategory,
    /// Name of the scanner that produced it.
    pub scanner: String,
    /// Score contributed by this finding.
    pub score: f64,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// Human-readable message.
    pub message: String,
    /// Optional extra detail (rule id, entity type, tool name...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Violation {
    /// Create a violation without detail.
    pub fn new(
        category: ViolationCategory,
        scanner: impl Into<String>,
        score: f64,
        threshold: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            scanner: scanner.into(),
            score,
            threshold,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// A tool call declared by the caller for this request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name as exposed by its server.
    pub name: String,
    /// Call arguments, opaque to the engine.
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// Id of the server that provides the tool, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

impl ToolCall {
    /// A tool call with no arguments and no origin server.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: serde_json::Value::Null,
            server_id: None,
        }
    }

    /// Set the originating server id.
    #[must_use]
    pub fn from_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Set the call arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Per-call metadata. Read-only for the duration of one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanContext {
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub user_classification: Option<String>,
    pub locale: Option<String>,
    /// Active preset name. The facade fills this in when absent.
    pub preset: Option<String>,
    /// Tool calls declared for this request.
    pub tools: Vec<ToolCall>,
}

impl ScanContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    #[must_use]
    pub fn with_tool(mut self, tool: ToolCall) -> Self {
        self.tools.push(tool);
        self
    }

    /// True when the caller declared at least one tool call.
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Timing and provenance of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// Wall time spent in the chain, in milliseconds.
    pub duration_ms: f64,
    /// Names of the scanners that actually ran, in order.
    pub scanners_run: Vec<String>,
    /// True when the result was served from the scan cache.
    pub cached: bool,
}

/// The externally visible outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// `true` unless the decision is `block`.
    pub safe: bool,
    pub decision: Decision,
    /// Input text after every sanitizing scanner ran. Equal to the input
    /// when nothing was masked.
    pub sanitized: String,
    /// Findings in chain order.
    pub violations: Vec<Violation>,
    pub metadata: ScanMetadata,
}

impl ScanResult {
    /// Build a result from an aggregated decision.
    pub fn new(
        decision: Decision,
        sanitized: String,
        violations: Vec<Violation>,
        metadata: ScanMetadata,
    ) -> Self {
        Self {
            safe: !decision.is_blocked(),
            decision,
            sanitized,
            violations,
            metadata,
        }
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.decision.is_blocked()
    }

    /// Concatenated violation messages, or the decision name when there are none.
    pub fn reason(&self) -> String {
        if self.violations.is_empty() {
            return self.decision.to_string();
        }
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Violations of one category.
    pub fn violations_of(&self, category: ViolationCategory) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.category == category)
    }
}

/// PII entity types known to the PII scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Iban,
    CreditCard,
    TaxId,
    SocialSecurity,
    Email,
    Phone,
    IpAddress,
    UrlCredentials,
}

impl PiiType {
    /// Snake-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iban => "iban",
            Self::CreditCard => "credit_card",
            Self::TaxId => "tax_id",
            Self::SocialSecurity => "social_security",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::IpAddress => "ip_address",
            Self::UrlCredentials => "url_credentials",
        }
    }

    /// Upper-case tag used in redactions, e.g. `[TAX_ID]`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Iban => "IBAN",
            Self::CreditCard => "CREDIT_CARD",
            Self::TaxId => "TAX_ID",
            Self::SocialSecurity => "SOCIAL_SECURITY",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::IpAddress => "IP_ADDRESS",
            Self::UrlCredentials => "URL_CREDENTIALS",
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a detected PII entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PiiAction {
    /// Block the whole request.
    Block,
    /// Replace with a type-specific redaction.
    Mask,
    /// Replace with a deterministic per-value token.
    Tokenize,
    /// Leave in place and do not report.
    Allow,
}

/// Injection strictness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Low,
    Medium,
    High,
}

impl Strictness {
    /// Block threshold for this level.
    pub const fn threshold(&self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 0.3,
            Self::High => 0.15,
        }
    }
}

impl FromStr for Strictness {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(PolicyError::InvalidConfig(format!(
                "unknown strictness '{}'",
                other
            ))),
        }
    }
}

/// What the injection scanner does once its score crosses the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionAction {
    /// Report `block`.
    Block,
    /// Cap the decision at `warn`.
    Warn,
}
