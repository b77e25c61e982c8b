//! # Warden Monitor
//!
//! Everything that happens around a scan rather than inside it: spend
//! control, spend anomaly detection, the audit trail and the scan cache.
//!
//! ## Threat Model
//!
//! LLM traffic is billed per token and leaves a compliance footprint:
//! - **Runaway spend** (per-entity and global budgets, hard and soft limits)
//! - **Compromised keys** (z-score spike detection on recorded costs)
//! - **Missing or leaky audit trail** (hashed, batched, best-effort records)
//! - **Rescan amplification** (bounded LRU + TTL result cache)
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`CostTracker`] | Budget checks and atomic spend recording |
//! | [`PricingTable`] | Per-model USD pricing with prefix lookup |
//! | [`BudgetStore`] | Counter store contract (memory, Redis) |
//! | [`detect_anomaly`] | Population z-score outlier test |
//! | [`AuditLogger`] | Buffered, timer-flushed audit trail |
//! | [`AuditStore`] | Audit sink contract (console, memory) |
//! | [`ScanCache`] | LRU map with per-entry TTL |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use warden_monitor::{BudgetConfig, CostTracker, MemoryBudgetStore};
//!
//! # tokio_test::block_on(async {
//! let tracker = CostTracker::new(Arc::new(MemoryBudgetStore::new()))
//!     .with_budget("team-a", BudgetConfig::daily(25.0).with_soft_limit(20.0))?;
//!
//! let check = tracker.check_budget("team-a", "gpt-4o", 1_200, None).await?;
//! assert!(check.allowed);
//!
//! tracker.record_cost("team-a", "gpt-4o", 1_200, 380).await?;
//! assert!(tracker.current_spend("team-a").await? > 0.0);
//! # Ok::<(), warden_monitor::MonitorError>(())
//! # }).unwrap();
//! ```
//!
//! ## References
//!
//! - Redis `INCRBYFLOAT` <https://redis.io/commands/incrbyfloat/>
//! - OWASP LLM10: Unbounded Consumption
//!   <https://owasp.org/www-project-top-10-for-large-language-model-applications/>
//!
//! ## Security Notes
//!
//! - Budget store failures propagate; audit store failures do not
//! - Counter increments are atomic in the store, never read-modify-write
//! - Budget checks are advisory snapshots, not transactions

mod anomaly;
mod audit;
mod budget;
mod cache;
mod cost;
mod error;
mod pricing;

pub use anomaly::{detect_anomaly, AnomalyReport, DEFAULT_Z_THRESHOLD};
pub use audit::{
    estimate_tokens, AuditExtras, AuditLogger, AuditLoggerConfig, AuditRecord, AuditStore,
    ConsoleAuditStore, MemoryAuditStore, RequestType,
};
pub use budget::{
    budget_key, BudgetConfig, BudgetPeriod, BudgetStore, MemoryBudgetStore, GLOBAL_ENTITY,
};
#[cfg(feature = "redis")]
pub use budget::RedisBudgetStore;
pub use cache::ScanCache;
pub use cost::{
    BudgetCheck, CostRecord, CostTracker, ANOMALY_WINDOW, DEFAULT_OUTPUT_ESTIMATE,
    DEFAULT_RECORD_LOG_CAPACITY,
};
pub use error::{MonitorError, Result};
pub use pricing::{ModelPricing, PricingTable, DEFAULT_PRICING};
