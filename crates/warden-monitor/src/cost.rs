//! # Cost Tracker
//!
//! Per-entity spend control on top of a [`BudgetStore`].
//!
//! ## Flow
//!
//! ```text
//! check_budget(entity, model, in, out)          record_cost(entity, model, in, out)
//!        │                                              │
//!        ▼                                              ▼
//!  pricing → estimate                            pricing → cost
//!  GET entity counter                            INCRBYFLOAT entity counter, EXPIRE 2×period
//!  projected vs soft / hard                      INCRBYFLOAT global counter (if budgeted)
//!  projected global vs global limits             z-score vs last 50 records → anomalous
//! ```
//!
//! ## Consistency
//!
//! Budget checks are advisory snapshots. A check followed by a record from a
//! concurrent caller is not transactional, so spend may overshoot by the
//! size of in-flight calls. Increments themselves are atomic in the store
//! and are never lost.
//!
//! ## Security Notes
//!
//! - Store failures propagate to the caller
//! - Unknown models are priced at the fallback rate, never zero
//! - The local record log is for inspection only and never drives enforcement
//! - Local memory is bounded: the record log is a ring and each entity keeps
//!   only its last [`ANOMALY_WINDOW`] costs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::anomaly::{detect_anomaly, DEFAULT_Z_THRESHOLD};
use crate::budget::{budget_key, BudgetConfig, BudgetPeriod, BudgetStore, GLOBAL_ENTITY};
use crate::error::{MonitorError, Result};
use crate::pricing::PricingTable;

/// Output tokens assumed when the caller gives no estimate.
pub const DEFAULT_OUTPUT_ESTIMATE: u64 = 500;

/// Previous records per entity fed to the anomaly detector.
pub const ANOMALY_WINDOW: usize = 50;

/// Records kept in the local log before the oldest are evicted.
pub const DEFAULT_RECORD_LOG_CAPACITY: usize = 10_000;

/// Result of a budget check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub allowed: bool,
    /// Spend already accumulated in the entity's current period.
    pub current_spend: f64,
    /// Hard limit minus current spend, never below zero. Infinite when the
    /// entity has no budget.
    pub remaining_budget: f64,
    pub warning: Option<String>,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub entity_id: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
    /// Cost is a z-score outlier against this entity's recent history.
    pub anomalous: bool,
}

/// Bounded local state: the export ring and per-entity cost windows.
#[derive(Default)]
struct Ledger {
    records: VecDeque<CostRecord>,
    history: HashMap<String, VecDeque<f64>>,
}

impl Ledger {
    /// Costs preceding this one for the entity, oldest first.
    fn window(&self, entity_id: &str) -> Vec<f64> {
        self.history
            .get(entity_id)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    fn push(&mut self, record: CostRecord, capacity: usize) {
        let window = self.history.entry(record.entity_id.clone()).or_default();
        if window.len() == ANOMALY_WINDOW {
            window.pop_front();
        }
        window.push_back(record.cost_usd);

        if capacity == 0 {
            return;
        }
        if self.records.len() == capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

/// Budget enforcement and spend accounting.
pub struct CostTracker {
    store: Arc<dyn BudgetStore>,
    pricing: PricingTable,
    budgets: HashMap<String, BudgetConfig>,
    ledger: Mutex<Ledger>,
    record_capacity: usize,
}

impl CostTracker {
    pub fn new(store: Arc<dyn BudgetStore>) -> Self {
        Self {
            store,
            pricing: PricingTable::new(),
            budgets: HashMap::new(),
            ledger: Mutex::new(Ledger::default()),
            record_capacity: DEFAULT_RECORD_LOG_CAPACITY,
        }
    }

    /// Bound the local record log. Zero keeps no records; anomaly
    /// detection is unaffected.
    #[must_use]
    pub fn with_record_log_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    /// Add a budget. Fails on negative or inverted limits.
    pub fn with_budget(mut self, entity_id: impl Into<String>, budget: BudgetConfig) -> Result<Self> {
        let entity_id = entity_id.into();
        budget.validate(&entity_id)?;
        self.budgets.insert(entity_id, budget);
        Ok(self)
    }

    pub fn budget(&self, entity_id: &str) -> Option<&BudgetConfig> {
        self.budgets.get(entity_id)
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Check whether a call with the given token estimate fits the budget.
    pub async fn check_budget(
        &self,
        entity_id: &str,
        model: &str,
        est_input_tokens: u64,
        est_output_tokens: Option<u64>,
    ) -> Result<BudgetCheck> {
        let estimate = self.pricing.cost(
            model,
            est_input_tokens,
            est_output_tokens.unwrap_or(DEFAULT_OUTPUT_ESTIMATE),
        );
        let now = Utc::now();

        let Some(budget) = self.budgets.get(entity_id) else {
            let current_spend = self.spend_at(entity_id, BudgetPeriod::Daily, now).await?;
            return Ok(BudgetCheck {
                allowed: true,
                current_spend,
                remaining_budget: f64::INFINITY,
                warning: None,
            });
        };

        let current_spend = self.spend_at(entity_id, budget.period, now).await?;
        let mut check = evaluate(entity_id, budget, current_spend, estimate);

        if entity_id != GLOBAL_ENTITY {
            if let Some(global) = self.budgets.get(GLOBAL_ENTITY) {
                let global_spend = self.spend_at(GLOBAL_ENTITY, global.period, now).await?;
                let global_check = evaluate(GLOBAL_ENTITY, global, global_spend, estimate);
                check.allowed &= global_check.allowed;
                check.remaining_budget = check.remaining_budget.min(global_check.remaining_budget);
                if let Some(global_warning) = global_check.warning {
                    check.warning = Some(match check.warning {
                        Some(w) => format!("{w}; {global_warning}"),
                        None => global_warning,
                    });
                }
            }
        }

        if !check.allowed {
            warn!(
                entity = %entity_id,
                current_spend = check.current_spend,
                estimate,
                "budget check denied"
            );
        }
        Ok(check)
    }

    /// Record actual spend for a completed call.
    pub async fn record_cost(
        &self,
        entity_id: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<CostRecord> {
        let cost = self.pricing.cost(model, input_tokens, output_tokens);
        let now = Utc::now();

        let period = self.period_for(entity_id);
        self.increment(&budget_key(entity_id, period, now), cost, period)
            .await?;

        if entity_id != GLOBAL_ENTITY {
            if let Some(global) = self.budgets.get(GLOBAL_ENTITY) {
                self.increment(&budget_key(GLOBAL_ENTITY, global.period, now), cost, global.period)
                    .await?;
            }
        }

        let mut ledger = self.ledger.lock().map_err(MonitorError::store)?;
        let history = ledger.window(entity_id);
        let anomaly = detect_anomaly(cost, &history, DEFAULT_Z_THRESHOLD);
        if anomaly.is_anomaly {
            warn!(
                entity = %entity_id,
                model = %model,
                cost_usd = cost,
                mean = anomaly.mean,
                z_score = anomaly.z_score,
                "spend anomaly"
            );
        }

        let record = CostRecord {
            entity_id: entity_id.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost_usd: cost,
            timestamp: now,
            anomalous: anomaly.is_anomaly,
        };
        ledger.push(record.clone(), self.record_capacity);
        debug!(entity = %entity_id, cost_usd = cost, "cost recorded");
        Ok(record)
    }

    /// Spend accumulated in the entity's current period.
    pub async fn current_spend(&self, entity_id: &str) -> Result<f64> {
        self.spend_at(entity_id, self.period_for(entity_id), Utc::now())
            .await
    }

    /// Snapshot of the local record log, oldest first.
    pub fn records(&self) -> Vec<CostRecord> {
        self.ledger
            .lock()
            .map(|l| l.records.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn period_for(&self, entity_id: &str) -> BudgetPeriod {
        self.budgets
            .get(entity_id)
            .map(|b| b.period)
            .unwrap_or_default()
    }

    async fn spend_at(&self, entity_id: &str, period: BudgetPeriod, now: DateTime<Utc>) -> Result<f64> {
        let key = budget_key(entity_id, period, now);
        match self.store.get(&key).await? {
            None => Ok(0.0),
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| MonitorError::CorruptCounter { key, value: raw }),
        }
    }

    async fn increment(&self, key: &str, amount: f64, period: BudgetPeriod) -> Result<()> {
        self.store.incrbyfloat(key, amount).await?;
        self.store.expire(key, period.ttl_seconds()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("budgets", &self.budgets)
            .field("record_capacity", &self.record_capacity)
            .finish_non_exhaustive()
    }
}

fn evaluate(entity_id: &str, budget: &BudgetConfig, current_spend: f64, estimate: f64) -> BudgetCheck {
    let projected = current_spend + estimate;
    let remaining_budget = (budget.hard_limit - current_spend).max(0.0);

    if projected > budget.hard_limit {
        return BudgetCheck {
            allowed: false,
            current_spend,
            remaining_budget,
            warning: Some(format!(
                "{entity_id} hard limit ${:.2} would be exceeded (projected ${projected:.4})",
                budget.hard_limit
            )),
        };
    }

    let warning = budget
        .soft_limit
        .filter(|soft| projected > *soft)
        .map(|soft| {
            format!("{entity_id} soft limit ${soft:.2} exceeded (projected ${projected:.4})")
        });

    BudgetCheck {
        allowed: true,
        current_spend,
        remaining_budget,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::MemoryBudgetStore;
    use crate::pricing::ModelPricing;

    /// `flat` costs $1 per million tokens, `unit` costs $1 per token.
    fn tracker() -> CostTracker {
        CostTracker::new(Arc::new(MemoryBudgetStore::new()))
            .with_pricing(
                PricingTable::new()
                    .with_model("flat", ModelPricing::new(1.0, 1.0))
                    .with_model("unit", ModelPricing::new(1_000_000.0, 1_000_000.0)),
            )
    }

    #[tokio::test]
    async fn test_no_budget_is_always_allowed() {
        let t = tracker();
        let check = t.check_budget("anyone", "flat", 1_000, None).await.unwrap();
        assert!(check.allowed);
        assert!(check.remaining_budget.is_infinite());
        assert_eq!(check.current_spend, 0.0);
    }

    #[tokio::test]
    async fn test_record_increments_current_spend() {
        let t = tracker();
        t.record_cost("a", "flat", 1_000_000, 0).await.unwrap();
        t.record_cost("a", "flat", 500_000, 500_000).await.unwrap();
        assert!((t.current_spend("a").await.unwrap() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_hard_limit_denies_with_remaining() {
        let t = tracker()
            .with_budget("a", BudgetConfig::daily(3.0))
            .unwrap();
        t.record_cost("a", "flat", 2_000_000, 0).await.unwrap();

        let check = t.check_budget("a", "flat", 2_000_000, Some(0)).await.unwrap();
        assert!(!check.allowed);
        assert!((check.remaining_budget - 1.0).abs() < 1e-9);
        assert!(check.warning.unwrap().contains("hard limit"));
    }

    #[tokio::test]
    async fn test_remaining_never_negative() {
        let t = tracker()
            .with_budget("a", BudgetConfig::daily(1.0))
            .unwrap();
        t.record_cost("a", "flat", 3_000_000, 0).await.unwrap();

        let check = t.check_budget("a", "flat", 1, Some(0)).await.unwrap();
        assert!(!check.allowed);
        assert_eq!(check.remaining_budget, 0.0);
    }

    #[tokio::test]
    async fn test_soft_limit_warns_but_allows() {
        let t = tracker()
            .with_budget("a", BudgetConfig::daily(10.0).with_soft_limit(1.0))
            .unwrap();
        let check = t.check_budget("a", "flat", 2_000_000, Some(0)).await.unwrap();
        assert!(check.allowed);
        assert!(check.warning.unwrap().contains("soft limit"));
    }

    #[tokio::test]
    async fn test_default_output_estimate() {
        let t = tracker()
            .with_budget("a", BudgetConfig::daily(0.0004))
            .unwrap();
        // 500 default output tokens at $1/M = $0.0005
        let check = t.check_budget("a", "flat", 0, None).await.unwrap();
        assert!(!check.allowed);
        let check = t.check_budget("a", "flat", 0, Some(100)).await.unwrap();
        assert!(check.allowed);
    }

    #[tokio::test]
    async fn test_global_cascade_on_record() {
        let t = tracker()
            .with_budget(GLOBAL_ENTITY, BudgetConfig::daily(100.0))
            .unwrap();
        t.record_cost("a", "flat", 1_000_000, 0).await.unwrap();
        t.record_cost("b", "flat", 2_000_000, 0).await.unwrap();

        assert!((t.current_spend("a").await.unwrap() - 1.0).abs() < 1e-9);
        assert!((t.current_spend(GLOBAL_ENTITY).await.unwrap() - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_cascade_without_global_budget() {
        let t = tracker()
            .with_budget("a", BudgetConfig::daily(100.0))
            .unwrap();
        t.record_cost("a", "flat", 1_000_000, 0).await.unwrap();
        assert_eq!(t.current_spend(GLOBAL_ENTITY).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_global_recording_does_not_double_count() {
        let t = tracker()
            .with_budget(GLOBAL_ENTITY, BudgetConfig::daily(100.0))
            .unwrap();
        t.record_cost(GLOBAL_ENTITY, "flat", 1_000_000, 0).await.unwrap();
        assert!((t.current_spend(GLOBAL_ENTITY).await.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_global_hard_limit_denies_entity() {
        let t = tracker()
            .with_budget(GLOBAL_ENTITY, BudgetConfig::daily(2.0))
            .unwrap()
            .with_budget("a", BudgetConfig::daily(100.0))
            .unwrap();
        t.record_cost("b", "flat", 1_500_000, 0).await.unwrap();

        let check = t.check_budget("a", "flat", 1_000_000, Some(0)).await.unwrap();
        assert!(!check.allowed);
        assert!((check.remaining_budget - 0.5).abs() < 1e-9);
        assert!(check.warning.unwrap().contains("global"));
    }

    #[tokio::test]
    async fn test_anomaly_flag_on_spike() {
        let t = tracker();
        for _ in 0..5 {
            let r = t.record_cost("a", "unit", 1, 0).await.unwrap();
            assert!(!r.anomalous);
        }
        let spike = t.record_cost("a", "unit", 1_000, 0).await.unwrap();
        assert!(spike.anomalous);
        assert_eq!(t.records().len(), 6);
    }

    #[tokio::test]
    async fn test_anomaly_history_is_per_entity() {
        let t = tracker();
        for _ in 0..5 {
            t.record_cost("small", "unit", 1, 0).await.unwrap();
        }
        let first = t.record_cost("big", "unit", 1_000, 0).await.unwrap();
        assert!(!first.anomalous);
    }

    #[tokio::test]
    async fn test_record_log_is_bounded() {
        let t = tracker().with_record_log_capacity(8);
        for _ in 0..(ANOMALY_WINDOW * 3) {
            t.record_cost("a", "unit", 1, 0).await.unwrap();
        }
        assert_eq!(t.records().len(), 8);
        assert_eq!(
            t.ledger.lock().unwrap().history["a"].len(),
            ANOMALY_WINDOW
        );

        // detection still sees the full window after eviction
        let spike = t.record_cost("a", "unit", 1_000, 0).await.unwrap();
        assert!(spike.anomalous);
        let records = t.records();
        assert_eq!(records.len(), 8);
        assert_eq!(records.last().map(|r| r.input_tokens), Some(1_000));
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_no_records() {
        let t = tracker().with_record_log_capacity(0);
        for _ in 0..5 {
            t.record_cost("a", "unit", 1, 0).await.unwrap();
        }
        assert!(t.records().is_empty());
        assert!(t.record_cost("a", "unit", 1_000, 0).await.unwrap().anomalous);
    }

    #[test]
    fn test_invalid_budget_rejected() {
        let result = tracker().with_budget("a", BudgetConfig::daily(1.0).with_soft_limit(2.0));
        assert!(matches!(result, Err(MonitorError::InvalidBudget { .. })));
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl BudgetStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(Some("not-a-number".to_string()))
        }
        async fn incrbyfloat(&self, _key: &str, _amount: f64) -> Result<String> {
            Err(MonitorError::store("connection refused"))
        }
        async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let t = CostTracker::new(Arc::new(BrokenStore));
        assert!(matches!(
            t.current_spend("a").await,
            Err(MonitorError::CorruptCounter { .. })
        ));
        assert!(matches!(
            t.check_budget("a", "gpt-4o", 10, None).await,
            Err(MonitorError::CorruptCounter { .. })
        ));
        assert!(matches!(
            t.record_cost("a", "gpt-4o", 10, 10).await,
            Err(MonitorError::Store(_))
        ));
        assert!(t.records().is_empty());
    }
}
