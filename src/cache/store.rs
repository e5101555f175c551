//! Key-value stores the view cache can sit on.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A string key-value store with per-entry expiry.
///
/// `add` must be atomic: of several callers adding the same absent key, at
/// most one sees `true`. The view cache builds its recompute lease on it.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Insert only if the key is absent or expired.
    fn add(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Returns whether a live entry was removed.
    fn delete(&self, key: &str) -> Result<bool>;
}

const DEFAULT_MAX_ENTRIES: usize = 1000;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Least recently used first.
    access_order: Vec<String>,
}

impl Entries {
    fn touch(&mut self, key: &str) {
        self.access_order.retain(|k| k != key);
        self.access_order.push(key.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.access_order.retain(|k| k != key);
        self.map.remove(key)
    }

    fn purge_expired(&mut self, now: Instant) {
        self.map.retain(|_, e| e.is_live(now));
        let map = &self.map;
        self.access_order.retain(|k| map.contains_key(k));
    }

    /// Drop expired entries, then least recently used ones until there is
    /// room for one more.
    fn make_room(&mut self, key: &str, max_entries: usize, now: Instant) {
        self.purge_expired(now);
        if self.map.contains_key(key) {
            return;
        }
        while self.map.len() >= max_entries && !self.access_order.is_empty() {
            let oldest = self.access_order.remove(0);
            self.map.remove(&oldest);
        }
    }

    fn insert(&mut self, key: &str, value: &str, expires_at: Instant) {
        self.map.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.touch(key);
    }
}

/// In-process LRU store. Expired entries are dropped on access and on every
/// write; past `max_entries` the least recently used entry goes.
pub struct MemoryCache {
    entries: Mutex<Entries>,
    max_entries: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::bounded(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().map.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    pub fn cleanup(&self) {
        self.entries().purge_expired(Instant::now());
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries();
        let Some(live) = entries.map.get(key).map(|e| e.is_live(now).then(|| e.value.clone())) else {
            return Ok(None);
        };
        match live {
            Some(value) => {
                entries.touch(key);
                Ok(Some(value))
            }
            None => {
                entries.remove(key);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries();
        entries.make_room(key, self.max_entries, now);
        entries.insert(key, value, now + ttl);
        Ok(())
    }

    fn add(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries();
        if entries.map.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.make_room(key, self.max_entries, now);
        entries.insert(key, value, now + ttl);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self.entries().remove(key).is_some_and(|e| e.is_live(now)))
    }
}
