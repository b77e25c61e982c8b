//! # Budget Periods and Counter Stores
//!
//! Spend accumulates in one counter per entity per period. The period key is
//! wall-clock UTC time truncated to the budget granularity, so counters
//! reset naturally when the period rolls over. Each counter carries an
//! expiry of twice the period length and cleans itself up.
//!
//! ## Key Layout
//!
//! | Period | Key suffix | Example key | TTL |
//! |--------|------------|-------------|-----|
//! | Hourly | `%Y-%m-%dT%H` | `warden:budget:a:2026-10-19T14` | 2h |
//! | Daily | `%Y-%m-%d` | `warden:budget:a:2026-10-19` | 48h |
//! | Monthly | `%Y-%m` | `warden:budget:a:2026-10` | 62d |
//!
//! ## Store Contract
//!
//! [`BudgetStore`] mirrors the three Redis commands the tracker needs:
//! `GET`, `INCRBYFLOAT` and `EXPIRE`. Increments MUST be atomic in the
//! store. The tracker never performs read-modify-write itself.
//!
//! ## Security Notes
//!
//! - Store errors propagate; a failing counter must not read as zero spend
//! - Counters hold amounts only, never prompt content

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Prefix of every budget counter key.
pub const KEY_PREFIX: &str = "warden:budget";

/// Entity id whose budget caps the sum of all entities.
pub const GLOBAL_ENTITY: &str = "global";

/// Granularity over which spend accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Hourly,
    #[default]
    Daily,
    Monthly,
}

impl BudgetPeriod {
    /// Period key for `now`.
    pub fn key(&self, now: DateTime<Utc>) -> String {
        let format = match self {
            BudgetPeriod::Hourly => "%Y-%m-%dT%H",
            BudgetPeriod::Daily => "%Y-%m-%d",
            BudgetPeriod::Monthly => "%Y-%m",
        };
        now.format(format).to_string()
    }

    /// Nominal period length in seconds (a month counts as 31 days).
    pub fn seconds(&self) -> u64 {
        match self {
            BudgetPeriod::Hourly => 3_600,
            BudgetPeriod::Daily => 86_400,
            BudgetPeriod::Monthly => 31 * 86_400,
        }
    }

    /// Counter expiry: twice the period.
    pub fn ttl_seconds(&self) -> u64 {
        self.seconds() * 2
    }
}

/// Spend limits for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Projected spend above this is denied.
    pub hard_limit: f64,
    /// Projected spend above this is allowed with a warning.
    pub soft_limit: Option<f64>,
    #[serde(default)]
    pub period: BudgetPeriod,
}

impl BudgetConfig {
    pub fn new(hard_limit: f64, period: BudgetPeriod) -> Self {
        Self {
            hard_limit,
            soft_limit: None,
            period,
        }
    }

    pub fn daily(hard_limit: f64) -> Self {
        Self::new(hard_limit, BudgetPeriod::Daily)
    }

    #[must_use]
    pub fn with_soft_limit(mut self, soft_limit: f64) -> Self {
        self.soft_limit = Some(soft_limit);
        self
    }

    /// Reject negative or inverted limits.
    pub fn validate(&self, entity: &str) -> Result<()> {
        let invalid = |reason: &str| MonitorError::InvalidBudget {
            entity: entity.to_string(),
            reason: reason.to_string(),
        };
        if !self.hard_limit.is_finite() || self.hard_limit < 0.0 {
            return Err(invalid("hard limit must be a non-negative number"));
        }
        if let Some(soft) = self.soft_limit {
            if !soft.is_finite() || soft < 0.0 {
                return Err(invalid("soft limit must be a non-negative number"));
            }
            if soft > self.hard_limit {
                return Err(invalid("soft limit exceeds hard limit"));
            }
        }
        Ok(())
    }
}

/// Counter key for an entity in the period containing `now`.
pub fn budget_key(entity_id: &str, period: BudgetPeriod, now: DateTime<Utc>) -> String {
    format!("{KEY_PREFIX}:{entity_id}:{}", period.key(now))
}

/// Counter store used by the cost tracker.
///
/// Values travel as strings, as they do over the Redis protocol.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Current value, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Atomically add `amount` and return the new value.
    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<String>;

    /// Set an expiry. Returns `true` if the key existed.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: f64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process counter store.
///
/// A single mutex serializes every operation, which gives increments the
/// same atomicity a Redis server provides.
#[derive(Debug, Default)]
pub struct MemoryBudgetStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryBudgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.counters
            .lock()
            .map(|c| c.values().filter(|c| c.live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BudgetStore for MemoryBudgetStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut counters = self.counters.lock().map_err(MonitorError::store)?;
        let now = Instant::now();
        match counters.get(key) {
            Some(counter) if counter.live(now) => Ok(Some(counter.value.to_string())),
            Some(_) => {
                counters.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<String> {
        let mut counters = self.counters.lock().map_err(MonitorError::store)?;
        let now = Instant::now();
        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0.0,
            expires_at: None,
        });
        if !counter.live(now) {
            *counter = Counter {
                value: 0.0,
                expires_at: None,
            };
        }
        counter.value += amount;
        Ok(counter.value.to_string())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut counters = self.counters.lock().map_err(MonitorError::store)?;
        let now = Instant::now();
        match counters.get_mut(key) {
            Some(counter) if counter.live(now) => {
                counter.expires_at = Some(now + Duration::from_secs(seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisBudgetStore;

#[cfg(feature = "redis")]
mod redis_store {
    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;
    use tracing::info;

    use super::BudgetStore;
    use crate::error::Result;

    /// Redis-backed counter store using native `INCRBYFLOAT`.
    #[derive(Clone)]
    pub struct RedisBudgetStore {
        conn: ConnectionManager,
    }

    impl RedisBudgetStore {
        /// Connect and verify the server answers `PING`.
        pub async fn connect(url: &str) -> Result<Self> {
            let client = redis::Client::open(url)?;
            let mut conn = ConnectionManager::new(client).await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            info!("connected to redis budget store");
            Ok(Self { conn })
        }
    }

    impl std::fmt::Debug for RedisBudgetStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RedisBudgetStore").finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl BudgetStore for RedisBudgetStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.conn.clone();
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        }

        async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<String> {
            let mut conn = self.conn.clone();
            let value: String = redis::cmd("INCRBYFLOAT")
                .arg(key)
                .arg(amount)
                .query_async(&mut conn)
                .await?;
            Ok(value)
        }

        async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
            let mut conn = self.conn.clone();
            let set: i64 = conn.expire(key, seconds as i64).await?;
            Ok(set == 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_period_keys() {
        let now = at(2026, 10, 19, 14);
        assert_eq!(BudgetPeriod::Hourly.key(now), "2026-10-19T14");
        assert_eq!(BudgetPeriod::Daily.key(now), "2026-10-19");
        assert_eq!(BudgetPeriod::Monthly.key(now), "2026-10");
    }

    #[test]
    fn test_budget_key_layout() {
        let key = budget_key("team-a", BudgetPeriod::Daily, at(2026, 1, 2, 3));
        assert_eq!(key, "warden:budget:team-a:2026-01-02");
    }

    #[test]
    fn test_ttl_is_twice_period() {
        assert_eq!(BudgetPeriod::Hourly.ttl_seconds(), 7_200);
        assert_eq!(BudgetPeriod::Daily.ttl_seconds(), 172_800);
    }

    #[test]
    fn test_budget_validation() {
        assert!(BudgetConfig::daily(10.0).with_soft_limit(8.0).validate("a").is_ok());
        assert!(BudgetConfig::daily(10.0).with_soft_limit(12.0).validate("a").is_err());
        assert!(BudgetConfig::daily(-1.0).validate("a").is_err());
        assert!(BudgetConfig::daily(f64::NAN).validate("a").is_err());
    }

    #[tokio::test]
    async fn test_memory_store_increment_and_get() {
        let store = MemoryBudgetStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        assert_eq!(store.incrbyfloat("k", 1.5).await.unwrap(), "1.5");
        assert_eq!(store.incrbyfloat("k", 2.0).await.unwrap(), "3.5");
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("3.5"));
    }

    #[tokio::test]
    async fn test_memory_store_expire_missing_key() {
        let store = MemoryBudgetStore::new();
        assert!(!store.expire("missing", 10).await.unwrap());
        store.incrbyfloat("k", 1.0).await.unwrap();
        assert!(store.expire("k", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_expired_counter_resets() {
        let store = MemoryBudgetStore::new();
        store.incrbyfloat("k", 5.0).await.unwrap();
        store.expire("k", 0).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
        assert_eq!(store.incrbyfloat("k", 1.0).await.unwrap(), "1");
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_increments_are_not_lost() {
        let store = std::sync::Arc::new(MemoryBudgetStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.incrbyfloat("k", 1.0).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("50"));
    }
}
