//! Response cache keyed by query keys.
//!
//! This module provides:
//! - [`CacheStore`] - the invalidate / update seam consumed by callers
//! - [`ResponseCache`] - bounded LRU store with TTL expiry and metrics
//! - delayed invalidations, fired by [`ResponseCache::run_due`]
//! - a bounded log of recent [`InvalidationEvent`]s

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use triage_core::Config;
use triage_core::config::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS};

use crate::key::{QueryKey, RequestDescriptor, matches};

/// Number of invalidation events kept for inspection.
pub const DEFAULT_MAX_EVENTS: usize = 64;

/// Boxed request predicate; `Send + Sync` so it can wait in the pending queue.
pub type Predicate = Box<dyn Fn(&RequestDescriptor) -> bool + Send + Sync>;

/// Invalidate / update operations over cached responses.
pub trait CacheStore: Send + Sync {
    /// Remove every entry whose key matches, after `delay`. A zero delay
    /// acts immediately and returns the number of removed entries; otherwise
    /// the invalidation is queued and `0` is returned.
    fn invalidate(&self, predicate: Predicate, delay: Duration) -> usize;

    /// Rewrite the cached value of every matching entry in place. Returns
    /// the number of rewritten entries; never creates entries.
    fn update(
        &self,
        predicate: &dyn Fn(&RequestDescriptor) -> bool,
        transform: &mut dyn FnMut(&Value) -> Value,
    ) -> usize;
}

/// Cached response entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Opaque key the entry was stored under.
    pub key: Value,
    pub value: Value,
    pub created_at: Instant,
    pub access_count: u64,
    pub last_accessed: Instant,
}

impl CacheEntry {
    fn new(key: Value, value: Value, now: Instant) -> Self {
        Self {
            key,
            value,
            created_at: now,
            access_count: 1,
            last_accessed: now,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Entries rewritten by `update`.
    pub updates: u64,
    pub evictions_capacity: u64,
    pub evictions_ttl: u64,
    /// Entries removed by predicate or full invalidation.
    pub evictions_invalidated: u64,
    pub current_entries: usize,
}

impl CacheMetrics {
    /// Hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Precision loss is acceptable for metrics
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Configuration for the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
    /// Disabled caches never store or return entries.
    pub enabled: bool,
    /// Delay used by [`ResponseCache::invalidate_default`].
    pub invalidate_delay: Duration,
    pub max_events: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            enabled: true,
            invalidate_delay: Duration::ZERO,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            max_entries: config.cache_max_entries,
            ttl: config.cache_ttl(),
            enabled: config.cache_enabled,
            invalidate_delay: config.invalidate_delay(),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

/// What removed entries from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationTrigger {
    /// Immediate predicate invalidation.
    Predicate,
    /// Delayed predicate invalidation fired by `run_due`.
    Scheduled,
    /// `invalidate_all`.
    All,
}

/// Record of one invalidation sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub trigger: InvalidationTrigger,
    #[serde(with = "triage_core::canonical::iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub entries_invalidated: usize,
}

struct PendingInvalidation {
    deadline: Instant,
    predicate: Predicate,
}

/// Bounded LRU cache of API responses.
///
/// Thread-safe via `RwLock`. Locks recover from poisoning, so a panicking
/// `update` transform leaves the cache usable.
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    metrics: RwLock<CacheMetrics>,
    pending: Mutex<Vec<PendingInvalidation>>,
    events: RwLock<VecDeque<InvalidationEvent>>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("metrics", &self.metrics())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            metrics: RwLock::new(CacheMetrics::default()),
            pending: Mutex::new(Vec::new()),
            events: RwLock::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached value for `key` if present and not expired.
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    #[allow(clippy::significant_drop_tightening)] // Lock ordering is intentional
    pub fn get_at(&self, key: &QueryKey, now: Instant) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        let id = key.stable_id();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(&id) else {
            drop(entries);
            self.with_metrics(|m| m.misses += 1);
            return None;
        };

        if entry.is_expired_at(self.config.ttl, now) {
            entries.remove(&id);
            let len = entries.len();
            drop(entries);
            self.with_metrics(|m| {
                m.misses += 1;
                m.evictions_ttl += 1;
                m.current_entries = len;
            });
            return None;
        }

        entry.touch(now);
        let value = entry.value.clone();
        drop(entries);
        self.with_metrics(|m| m.hits += 1);
        Some(value)
    }

    /// Store `value` under `key`, evicting the least recently used entry at
    /// capacity.
    pub fn put(&self, key: &QueryKey, value: Value) {
        self.put_at(key, value, Instant::now());
    }

    pub fn put_at(&self, key: &QueryKey, value: Value, now: Instant) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        let id = key.stable_id();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = 0;
        if entries.len() >= self.config.max_entries && !entries.contains_key(&id) {
            evicted = Self::evict_lru(&mut entries);
        }
        entries.insert(id, CacheEntry::new(key.to_value(), value, now));
        let len = entries.len();
        drop(entries);

        self.with_metrics(|m| {
            m.inserts += 1;
            m.evictions_capacity += evicted;
            m.current_entries = len;
        });
    }

    fn evict_lru(entries: &mut HashMap<String, CacheEntry>) -> u64 {
        let lru_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone());
        match lru_key {
            Some(key) => {
                entries.remove(&key);
                1
            }
            None => 0,
        }
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        entries.clear();
        drop(entries);

        self.with_metrics(|m| {
            m.evictions_invalidated += count as u64;
            m.current_entries = 0;
        });
        self.record(InvalidationTrigger::All, count);
        count
    }

    /// Invalidate with the configured default delay.
    pub fn invalidate_default(&self, predicate: Predicate) -> usize {
        self.invalidate(predicate, self.config.invalidate_delay)
    }

    /// Fire every queued invalidation whose deadline is at or before `now`.
    /// Returns the number of removed entries.
    pub fn run_due(&self, now: Instant) -> usize {
        let due: Vec<PendingInvalidation> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let (due, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|p| p.deadline <= now);
            *pending = waiting;
            due
        };
        due.iter()
            .map(|p| self.sweep(&*p.predicate, InvalidationTrigger::Scheduled))
            .sum()
    }

    /// Earliest deadline among queued invalidations.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|p| p.deadline)
            .min()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop expired entries.
    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Instant::now())
    }

    pub fn prune_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(self.config.ttl, now));
        let removed = before - entries.len();
        let len = entries.len();
        drop(entries);

        if removed > 0 {
            self.with_metrics(|m| {
                m.evictions_ttl += removed as u64;
                m.current_entries = len;
            });
        }
        removed
    }

    /// Opaque keys of every cached entry.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.key.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn metrics(&self) -> CacheMetrics {
        *self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recent invalidation events, oldest first.
    #[must_use]
    pub fn recent_events(&self) -> Vec<InvalidationEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn sweep(&self, predicate: &dyn Fn(&RequestDescriptor) -> bool, trigger: InvalidationTrigger) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !matches(&entry.key, predicate));
        let removed = before - entries.len();
        let len = entries.len();
        drop(entries);

        self.with_metrics(|m| {
            m.evictions_invalidated += removed as u64;
            m.current_entries = len;
        });
        self.record(trigger, removed);
        tracing::debug!(?trigger, removed, remaining = len, "cache invalidation sweep");
        removed
    }

    fn record(&self, trigger: InvalidationTrigger, entries_invalidated: usize) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push_back(InvalidationEvent {
            trigger,
            timestamp: Utc::now(),
            entries_invalidated,
        });
        while events.len() > self.config.max_events {
            events.pop_front();
        }
    }

    fn with_metrics(&self, f: impl FnOnce(&mut CacheMetrics)) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics);
    }
}

impl CacheStore for ResponseCache {
    fn invalidate(&self, predicate: Predicate, delay: Duration) -> usize {
        if delay.is_zero() {
            return self.sweep(&*predicate, InvalidationTrigger::Predicate);
        }
        let deadline = Instant::now() + delay;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingInvalidation { deadline, predicate });
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "cache invalidation scheduled"
        );
        0
    }

    fn update(
        &self,
        predicate: &dyn Fn(&RequestDescriptor) -> bool,
        transform: &mut dyn FnMut(&Value) -> Value,
    ) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0usize;
        for entry in entries.values_mut() {
            if matches(&entry.key, predicate) {
                entry.value = transform(&entry.value);
                updated += 1;
            }
        }
        drop(entries);

        if updated > 0 {
            self.with_metrics(|m| m.updates += updated as u64);
            tracing::debug!(updated, "cache entries updated in place");
        }
        updated
    }
}
