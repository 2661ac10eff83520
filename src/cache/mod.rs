//! Memory Cache
//!
//! Bounded key/value cache with per-entry TTL and least-used eviction.
//! Expiry is lazy: an expired entry is only purged when it is read.

use crate::types::NodeKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of live entries
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Default time-to-live in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    access_count: u64,
    /// Position of the key's first insertion; overwrites keep it
    inserted_seq: u64,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

/// Bounded TTL cache with least-used eviction
///
/// All operations take `&self`; get-then-count and evict-then-insert each run
/// under a single lock so the cache can be shared across tasks.
pub struct MemoryCache<V> {
    inner: Mutex<CacheInner<V>>,
    max_entries: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            max_entries: config.max_entries.max(1),
            default_ttl: config.ttl(),
            clock,
        }
    }

    /// Deterministic key for a page of `parent`'s children (or of the roots)
    pub fn generate_key(parent: Option<&NodeKey>, page: u32) -> String {
        format!(
            "nodes_{}_{}",
            parent.map(NodeKey::as_str).unwrap_or("root"),
            page
        )
    }

    /// Insert with the default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite; resets expiry and access count
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = self.clock.now() + ttl;
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.expires_at = expires_at;
            entry.access_count = 0;
            return;
        }

        if inner.entries.len() >= self.max_entries {
            Self::evict_least_used(&mut inner);
        }

        let inserted_seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                access_count: 0,
                inserted_seq,
            },
        );
    }

    /// Read a live entry, bumping its access count. Expired entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => now >= entry.expires_at,
        };
        if expired {
            inner.entries.remove(key);
            trace!(key, "Cache entry expired");
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        Some(entry.value.clone())
    }

    /// Presence check that neither counts as an access nor purges
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|entry| now < entry.expires_at)
            .unwrap_or(false)
    }

    pub fn delete(&self, key: &str) {
        self.inner.lock().entries.remove(key);
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of tracked entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Access count of an entry, if tracked
    pub fn access_count(&self, key: &str) -> Option<u64> {
        self.inner.lock().entries.get(key).map(|e| e.access_count)
    }

    /// Remove the entry with the lowest access count; ties go to the earliest inserted.
    fn evict_least_used(inner: &mut CacheInner<V>) {
        let victim = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.inserted_seq))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            trace!(key = %key, "Evicting least used cache entry");
            inner.entries.remove(&key);
        }
    }
}

impl<V: Clone + Serialize> MemoryCache<V> {
    /// Approximate footprint in bytes (JSON length of key and value, two bytes per char)
    pub fn estimated_size_bytes(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .map(|(key, entry)| {
                let key_len = serde_json::to_string(key).map(|s| s.len()).unwrap_or(0);
                let value_len = serde_json::to_string(&entry.value)
                    .map(|s| s.len())
                    .unwrap_or(0);
                (key_len + value_len) * 2
            })
            .sum()
    }
}
