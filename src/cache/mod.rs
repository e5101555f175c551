//! Read-through cache for aggregate views.
//!
//! Entries are keyed by view name, store fingerprint and filter, so any
//! mutation of the timeline retires every cached projection on the next
//! read. The TTL only bounds growth.

pub mod fingerprint;
pub mod store;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

pub use fingerprint::{fingerprint, EMPTY_FINGERPRINT};
pub use store::{CacheStore, MemoryCache};

const KEY_PREFIX: &str = "burstline";
const LEASE_SUFFIX: &str = ":lock";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Filter parameters of a projection, normalized into a cache key segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    params: BTreeMap<String, String>,
}

impl ViewFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// `k=v` pairs sorted by name and joined with `,`, or `all`.
    pub fn descriptor(&self) -> String {
        if self.params.is_empty() {
            return "all".to_string();
        }
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn cache_key(view: &str, fingerprint: &str, filter: &ViewFilter) -> String {
    format!("{}:{}:{}:{}", KEY_PREFIX, view, fingerprint, filter.descriptor())
}

pub struct ViewCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    lease_ttl: Duration,
    poll_interval: Duration,
}

impl ViewCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, lease_ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            lease_ttl,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.ttl_secs),
            Duration::from_secs(config.race_condition_ttl_secs),
        )
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Serialized projection for `(view, fingerprint, filter)`, computing and
    /// storing it on a miss.
    ///
    /// Concurrent misses on one key are collapsed: the caller that wins the
    /// lease computes while the rest poll for its result, falling back to
    /// computing themselves once the lease runs out. Errors from `compute`
    /// are returned unchanged and nothing is stored.
    pub fn get_or_compute<T, F>(
        &self,
        view: &str,
        fingerprint: &str,
        filter: &ViewFilter,
        force: bool,
        compute: F,
    ) -> Result<String>
    where
        T: Serialize,
        F: FnOnce() -> Result<T>,
    {
        let key = cache_key(view, fingerprint, filter);

        if force {
            self.store.delete(&key)?;
            tracing::debug!(%key, "Forced refresh");
        } else if let Some(hit) = self.store.get(&key)? {
            tracing::debug!(%key, "Cache hit");
            return Ok(hit);
        }

        let lease = format!("{}{}", key, LEASE_SUFFIX);
        let holds_lease = match self.wait_for_turn(&key, &lease, force)? {
            Turn::Ready(hit) => return Ok(hit),
            Turn::Compute { holds_lease } => holds_lease,
        };

        let started = Instant::now();
        let result = compute().and_then(|value| Ok(serde_json::to_string(&value)?));
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                if holds_lease {
                    self.store.delete(&lease)?;
                }
                return Err(e);
            }
        };

        self.store.set(&key, &payload, self.ttl)?;
        if holds_lease {
            self.store.delete(&lease)?;
        }
        tracing::debug!(%key, elapsed_ms = started.elapsed().as_millis() as u64, "Cache fill");
        Ok(payload)
    }

    /// Typed form of [`get_or_compute`](Self::get_or_compute).
    pub fn get_or_compute_as<T, F>(
        &self,
        view: &str,
        fingerprint: &str,
        filter: &ViewFilter,
        force: bool,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let payload = self.get_or_compute(view, fingerprint, filter, force, compute)?;
        Ok(serde_json::from_str(&payload)?)
    }

    fn wait_for_turn(&self, key: &str, lease: &str, force: bool) -> Result<Turn> {
        let deadline = Instant::now() + self.lease_ttl;
        loop {
            if self.store.add(lease, "1", self.lease_ttl)? {
                // Someone may have filled the key between our miss and the lease.
                if !force {
                    if let Some(hit) = self.store.get(key)? {
                        self.store.delete(lease)?;
                        return Ok(Turn::Ready(hit));
                    }
                }
                return Ok(Turn::Compute { holds_lease: true });
            }

            std::thread::sleep(self.poll_interval);
            if let Some(hit) = self.store.get(key)? {
                return Ok(Turn::Ready(hit));
            }
            if Instant::now() >= deadline {
                tracing::warn!(%key, "Recompute lease expired, computing anyway");
                return Ok(Turn::Compute { holds_lease: false });
            }
        }
    }
}

enum Turn {
    Ready(String),
    Compute { holds_lease: bool },
}
