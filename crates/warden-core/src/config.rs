//! Configuration types for LLM Warden.
//!
//! One serde tree covers every component. Unset values fall back to the
//! active preset, so `{"preset": "strict"}` is a complete configuration.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_firewall::{CustomRule, HeuristicConfig, HeuristicScanner};
use warden_monitor::{BudgetConfig, ModelPricing};
use warden_policy::{PiiAction, PiiType, PresetName, Strictness};
use warden_registry::{ToolManifestPin, ToolPermissions};

use crate::{error::WardenError, Result};

/// Configuration for the Warden facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Active preset name (`strict`, `moderate`, `relaxed` or an alias).
    pub preset: String,

    /// Stop the scanner chain at the first `block`.
    pub early_exit: bool,

    /// Prompt-injection scanner settings.
    pub injection: InjectionConfig,

    /// PII scanner settings.
    pub pii: PiiSettings,

    /// Tool policy scanner settings.
    pub tools: ToolSettings,

    /// Cost tracker settings.
    pub cost: CostConfig,

    /// Audit logger settings.
    pub audit: AuditConfig,

    /// Scan cache settings.
    pub cache: CacheConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            preset: PresetName::default().as_str().to_string(),
            early_exit: true,
            injection: InjectionConfig::default(),
            pii: PiiSettings::default(),
            tools: ToolSettings::default(),
            cost: CostConfig::default(),
            audit: AuditConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Prompt-injection scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    pub enabled: bool,
    /// Strictness level, used when no explicit threshold is set.
    pub strictness: Option<Strictness>,
    /// Explicit block threshold in `(0, 1]`.
    pub threshold: Option<f64>,
    /// Additional weighted patterns.
    pub custom_patterns: Vec<CustomRule>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strictness: None,
            threshold: None,
            custom_patterns: Vec::new(),
        }
    }
}

/// PII scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiSettings {
    pub enabled: bool,
    /// Action for types without an override. Defaults to the preset's.
    pub default_action: Option<PiiAction>,
    /// Per-type overrides, applied on top of the preset table.
    pub actions: HashMap<PiiType, PiiAction>,
    /// Types that are never reported.
    pub allow_list: HashSet<PiiType>,
}

impl Default for PiiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_action: None,
            actions: HashMap::new(),
            allow_list: HashSet::new(),
        }
    }
}

/// Tool policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub enabled: bool,
    /// Permission sets keyed by agent id.
    pub agents: HashMap<String, ToolPermissions>,
    /// Extra dangerous patterns, merged with the preset's.
    pub dangerous_patterns: Vec<String>,
    /// Max tool calls per request. Defaults to the preset's.
    pub max_chain_depth: Option<usize>,
    /// Deny every tool call.
    pub read_only: bool,
    /// Inline manifest pins.
    pub pins: Vec<ToolManifestPin>,
    /// Sled pin store, loaded at construction and written by `pin_manifest`.
    pub pin_db_path: Option<PathBuf>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            agents: HashMap::new(),
            dangerous_patterns: Vec::new(),
            max_chain_depth: None,
            read_only: false,
            pins: Vec::new(),
            pin_db_path: None,
        }
    }
}

/// Cost tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub enabled: bool,
    /// Budgets keyed by entity id. `global` caps the sum of all entities.
    pub budgets: HashMap<String, BudgetConfig>,
    /// Pricing overrides keyed by model name.
    pub pricing: HashMap<String, ModelPricing>,
    /// Redis URL for the budget store. Requires the `redis` feature.
    pub store_url: Option<String>,
    /// Use the preset's daily budget for `global` when none is configured.
    pub apply_preset_budget: bool,
    /// Cost records kept in memory for inspection. Defaults to 10 000.
    pub record_log_capacity: Option<usize>,
}

/// Built-in audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStoreKind {
    #[default]
    Memory,
    Console,
}

/// Audit logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub store: AuditStoreKind,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Days of records the memory sink keeps.
    pub retention_days: Option<u32>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: AuditStoreKind::Memory,
            batch_size: 100,
            flush_interval_ms: 5_000,
            retention_days: None,
        }
    }
}

impl AuditConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Scan cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: 1_000,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl WardenConfig {
    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[must_use]
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    #[must_use]
    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>, permissions: ToolPermissions) -> Self {
        self.tools.agents.insert(agent_id.into(), permissions);
        self
    }

    #[must_use]
    pub fn with_pin(mut self, pin: ToolManifestPin) -> Self {
        self.tools.pins.push(pin);
        self
    }

    #[must_use]
    pub fn with_budget(mut self, entity_id: impl Into<String>, budget: BudgetConfig) -> Self {
        self.cost.enabled = true;
        self.cost.budgets.insert(entity_id.into(), budget);
        self
    }

    #[must_use]
    pub fn with_audit(mut self, batch_size: usize, flush_interval: Duration) -> Self {
        self.audit.enabled = true;
        self.audit.batch_size = batch_size;
        self.audit.flush_interval_ms = flush_interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, max_size: usize, ttl: Duration) -> Self {
        self.cache.enabled = true;
        self.cache.max_size = max_size;
        self.cache.ttl_secs = ttl.as_secs();
        self
    }

    /// Parsed preset name.
    pub fn preset_name(&self) -> Result<PresetName> {
        Ok(PresetName::from_str(&self.preset)?)
    }

    /// Fail fast on anything that would make construction or scanning
    /// misbehave.
    pub fn validate(&self) -> Result<()> {
        self.preset_name()?;

        if let Some(threshold) = self.injection.threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(WardenError::Config(format!(
                    "injection threshold {threshold} outside (0, 1]"
                )));
            }
        }
        if !self.injection.custom_patterns.is_empty() {
            let config = self
                .injection
                .custom_patterns
                .iter()
                .cloned()
                .fold(HeuristicConfig::default(), HeuristicConfig::with_custom_rule);
            HeuristicScanner::new(config)?;
        }

        if self.tools.max_chain_depth == Some(0) {
            return Err(WardenError::Config("max_chain_depth must be at least 1".into()));
        }

        for (entity, budget) in &self.cost.budgets {
            budget.validate(entity)?;
        }
        for (model, pricing) in &self.cost.pricing {
            if pricing.input_per_million < 0.0 || pricing.output_per_million < 0.0 {
                return Err(WardenError::Config(format!("negative price for model '{model}'")));
            }
        }
        if self.cost.store_url.is_some() && !cfg!(feature = "redis") {
            return Err(WardenError::Config(
                "cost.store_url requires the `redis` feature".into(),
            ));
        }

        if self.audit.batch_size == 0 {
            return Err(WardenError::Config("audit batch_size must be at least 1".into()));
        }
        if self.audit.flush_interval_ms == 0 {
            return Err(WardenError::Config("audit flush_interval_ms must be positive".into()));
        }
        if self.cache.max_size == 0 {
            return Err(WardenError::Config("cache max_size must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.preset, "moderate");
        assert!(config.early_exit);
        assert!(config.injection.enabled);
        assert!(!config.cost.enabled);
        assert!(!config.audit.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = WardenConfig::default().with_budget("global", BudgetConfig::daily(5.0));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: WardenConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: WardenConfig = serde_json::from_str(
            r#"{"preset": "public", "pii": {"actions": {"email": "block"}}}"#,
        )
        .unwrap();
        assert_eq!(parsed.preset_name().unwrap(), PresetName::Strict);
        assert_eq!(parsed.pii.actions.get(&PiiType::Email), Some(&PiiAction::Block));
        assert!(parsed.tools.enabled);
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let err = WardenConfig::default().with_preset("paranoid").validate().unwrap_err();
        assert!(matches!(err, WardenError::Policy(_)));
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = WardenConfig::default();
        config.injection.threshold = Some(0.0);
        assert!(config.validate().is_err());
        config.injection.threshold = Some(1.0);
        assert!(config.validate().is_ok());
        config.injection.threshold = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_custom_pattern_rejected() {
        let mut config = WardenConfig::default();
        config.injection.custom_patterns.push(CustomRule::new("bad", "(unclosed"));
        assert!(matches!(config.validate(), Err(WardenError::Firewall(_))));
    }

    #[test]
    fn test_inverted_budget_rejected() {
        let config = WardenConfig::default()
            .with_budget("a", BudgetConfig::daily(1.0).with_soft_limit(5.0));
        assert!(matches!(config.validate(), Err(WardenError::Monitor(_))));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let mut config = WardenConfig::default();
        config.audit.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = WardenConfig::default();
        config.cache.max_size = 0;
        assert!(config.validate().is_err());
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_store_url_needs_redis_feature() {
        let mut config = WardenConfig::default();
        config.cost.store_url = Some("redis://127.0.0.1/".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(&path, r#"{"preset": "ops", "cache": {"enabled": true}}"#).unwrap();

        let config = WardenConfig::load(&path).unwrap();
        assert_eq!(config.preset_name().unwrap(), PresetName::Relaxed);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_size, 1_000);
    }
}
