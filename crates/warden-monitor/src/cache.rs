//! # Scan Cache
//!
//! Bounded LRU map with a per-entry time-to-live, used to skip rescanning
//! identical requests.
//!
//! ## Eviction Policy
//!
//! | Trigger | Effect |
//! |---------|--------|
//! | `get` on an expired entry | Entry removed, miss returned |
//! | `set` at capacity | Single least recently used entry removed |
//! | `prune` | Every expired entry removed |
//!
//! There is no background thread. Memory is bounded by `max_size` entries
//! whatever the traffic pattern.
//!
//! ## Security Notes
//!
//! - Keys should be fingerprints, never raw prompt text
//! - A TTL bounds how long a result survives a policy change

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    /// Position in the recency order; larger is more recent.
    tick: u64,
}

/// LRU + TTL cache.
///
/// Not internally synchronized; wrap it in a mutex to share.
#[derive(Debug, Clone)]
pub struct ScanCache<V> {
    entries: HashMap<String, Entry<V>>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> ScanCache<V> {
    /// Create a cache. A `max_size` of zero is raised to one.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Look up `key`, promoting it to most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Insert or replace `key`, evicting the least recently used entry when
    /// full.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now {
            let tick = entry.tick;
            self.entries.remove(key);
            self.recency.remove(&tick);
            return None;
        }

        let old_tick = entry.tick;
        let tick = self.bump();
        self.recency.remove(&old_tick);
        self.recency.insert(tick, key.to_string());
        let entry = self.entries.get_mut(key)?;
        entry.tick = tick;
        Some(entry.value.clone())
    }

    fn set_at(&mut self, key: String, value: V, now: Instant) {
        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.tick);
        } else if self.entries.len() >= self.max_size {
            if let Some((_, lru_key)) = self.recency.pop_first() {
                self.entries.remove(&lru_key);
                debug!(size = self.entries.len(), "scan cache evicted lru entry");
            }
        }

        let tick = self.bump();
        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                tick,
            },
        );
    }

    fn prune_at(&mut self, now: Instant) -> usize {
        let expired: Vec<(String, u64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, e)| (k.clone(), e.tick))
            .collect();
        for (key, tick) in &expired {
            self.entries.remove(key);
            self.recency.remove(tick);
        }
        expired.len()
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }
}
