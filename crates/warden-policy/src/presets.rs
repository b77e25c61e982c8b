//! # Policy Presets
//!
//! A preset is a fixed bundle of scanner defaults representing one trust
//! level. Trust in the caller increases from `strict` to `relaxed`: injection
//! thresholds loosen and the dangerous-tool list shrinks.
//!
//! | Preset   | Aliases                | Injection       | Max tool depth | Daily budget |
//! |----------|------------------------|-----------------|----------------|--------------|
//! | strict   | `public`, `public-facing` | 0.15 / block | 3              | $10          |
//! | moderate | `internal`             | 0.30 / block    | 5              | $50          |
//! | relaxed  | `operations`, `ops`    | 0.50 / warn     | 10             | $200         |
//!
//! [`PolicyEngine`] is a read-only accessor over one selected preset.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};
use crate::model::{InjectionAction, PiiAction, PiiType};

/// Known preset names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    /// Public-facing assistants.
    Strict,
    /// Internal tools used by employees.
    #[default]
    Moderate,
    /// Operations agents with broad tool access.
    Relaxed,
}

impl PresetName {
    pub const ALL: [PresetName; 3] = [Self::Strict, Self::Moderate, Self::Relaxed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Moderate => "moderate",
            Self::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "public" | "public-facing" => Ok(Self::Strict),
            "moderate" | "internal" => Ok(Self::Moderate),
            "relaxed" | "operations" | "ops" => Ok(Self::Relaxed),
            _ => Err(PolicyError::UnknownPreset(s.to_string())),
        }
    }
}

/// Injection defaults of a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionPreset {
    pub threshold: f64,
    pub action: InjectionAction,
}

/// PII defaults of a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiiPreset {
    pub default_action: PiiAction,
    pub actions: HashMap<PiiType, PiiAction>,
}

/// Tool defaults of a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolPreset {
    pub dangerous_patterns: Vec<String>,
    pub max_chain_depth: usize,
}

/// Budget defaults of a preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetPreset {
    /// Default daily budget in USD.
    pub daily: f64,
    /// Fraction of the daily budget at which a warning is raised.
    pub warn_pct: f64,
}

/// A complete preset bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub name: PresetName,
    pub injection: InjectionPreset,
    pub pii: PiiPreset,
    pub tools: ToolPreset,
    pub budget: BudgetPreset,
}

fn patterns(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

impl Preset {
    /// Build the bundle for a preset name.
    pub fn for_name(name: PresetName) -> Self {
        use PiiAction::{Allow, Block, Mask};

        match name {
            PresetName::Strict => Self {
                name,
                injection: InjectionPreset {
                    threshold: 0.15,
                    action: InjectionAction::Block,
                },
                pii: PiiPreset {
                    default_action: Mask,
                    actions: HashMap::from([
                        (PiiType::Email, Mask),
                        (PiiType::Phone, Mask),
                        (PiiType::CreditCard, Block),
                        (PiiType::Iban, Block),
                    ]),
                },
                tools: ToolPreset {
                    dangerous_patterns: patterns(&[
                        "*delete*", "*drop*", "exec*", "shell*", "*rm_rf*", "*sudo*",
                        "*transfer*", "*payment*",
                    ]),
                    max_chain_depth: 3,
                },
                budget: BudgetPreset {
                    daily: 10.0,
                    warn_pct: 0.8,
                },
            },
            PresetName::Moderate => Self {
                name,
                injection: InjectionPreset {
                    threshold: 0.3,
                    action: InjectionAction::Block,
                },
                pii: PiiPreset {
                    default_action: Mask,
                    actions: HashMap::from([
                        (PiiType::Email, Allow),
                        (PiiType::Phone, Mask),
                        (PiiType::CreditCard, Block),
                        (PiiType::Iban, Mask),
                    ]),
                },
                tools: ToolPreset {
                    dangerous_patterns: patterns(&[
                        "*delete*", "*drop*", "exec*", "shell*", "*sudo*",
                    ]),
                    max_chain_depth: 5,
                },
                budget: BudgetPreset {
                    daily: 50.0,
                    warn_pct: 0.8,
                },
            },
            PresetName::Relaxed => Self {
                name,
                injection: InjectionPreset {
                    threshold: 0.5,
                    action: InjectionAction::Warn,
                },
                pii: PiiPreset {
                    default_action: Mask,
                    actions: HashMap::from([
                        (PiiType::Email, Allow),
                        (PiiType::Phone, Allow),
                        (PiiType::CreditCard, Mask),
                        (PiiType::Iban, Mask),
                    ]),
                },
                tools: ToolPreset {
                    dangerous_patterns: patterns(&["*rm_rf*", "*drop_database*"]),
                    max_chain_depth: 10,
                },
                budget: BudgetPreset {
                    daily: 200.0,
                    warn_pct: 0.9,
                },
            },
        }
    }
}

/// Read-only accessor over a selected preset.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEngine {
    preset: Preset,
}

impl PolicyEngine {
    /// Select a preset by name or alias.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::UnknownPreset` for unrecognised names.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self::from_name(name.parse()?))
    }

    pub fn from_name(name: PresetName) -> Self {
        Self {
            preset: Preset::for_name(name),
        }
    }

    pub fn name(&self) -> PresetName {
        self.preset.name
    }

    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub fn injection_threshold(&self) -> f64 {
        self.preset.injection.threshold
    }

    pub fn injection_action(&self) -> InjectionAction {
        self.preset.injection.action
    }

    /// PII action for an entity type, or the preset default when `None` or
    /// when the preset has no entry for the type.
    pub fn pii_action(&self, pii_type: Option<PiiType>) -> PiiAction {
        pii_type
            .and_then(|t| self.preset.pii.actions.get(&t).copied())
            .unwrap_or(self.preset.pii.default_action)
    }

    /// The preset's per-type PII table.
    pub fn pii_actions(&self) -> &HashMap<PiiType, PiiAction> {
        &self.preset.pii.actions
    }

    pub fn dangerous_patterns(&self) -> &[String] {
        &self.preset.tools.dangerous_patterns
    }

    pub fn max_chain_depth(&self) -> usize {
        self.preset.tools.max_chain_depth
    }

    pub fn daily_budget(&self) -> f64 {
        self.preset.budget.daily
    }

    pub fn budget_warn_pct(&self) -> f64 {
        self.preset.budget.warn_pct
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::from_name(PresetName::default())
    }
}
