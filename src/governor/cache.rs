//! Response cache with per-method TTLs
//!
//! key -> (value, timestamp), keyed by method plus serialized params.
//! Last-write-wins, no versioning. There is deliberately no entry-count
//! bound; `sweep()` removing entries older than 3x their TTL is the only
//! reclamation.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::constants::SWEEP_TTL_FACTOR;

/// A cached response value and when it was stored
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    timestamp: Instant,
    ttl: Duration,
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    method_ttls: HashMap<String, Duration>,
}

impl ResponseCache {
    pub fn new(default_ttl_ms: u64, method_ttl_ms: &HashMap<String, u64>) -> Self {
        let method_ttls = method_ttl_ms
            .iter()
            .map(|(method, ms)| (method.clone(), Duration::from_millis(*ms)))
            .collect();

        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::from_millis(default_ttl_ms),
            method_ttls,
        }
    }

    /// TTL for a method, falling back to the default
    pub fn ttl_for(&self, method: &str) -> Duration {
        self.method_ttls
            .get(method)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    /// Get a value still within its TTL
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.timestamp.elapsed() < entry.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Get a value regardless of freshness
    ///
    /// Used by the open-breaker read path, where a stale answer beats a
    /// throttled network round trip.
    pub fn get_stale(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).map(|e| e.value.clone())
    }

    /// Store a value under the method's TTL
    pub fn set(&self, method: &str, key: &str, value: Value) {
        let entry = CacheEntry {
            value,
            timestamp: Instant::now(),
            ttl: self.ttl_for(method),
        };
        self.entries.lock().insert(key.to_string(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove entries older than 3x their TTL, returning how many went
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.timestamp.elapsed() < entry.ttl * SWEEP_TTL_FACTOR);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Build the cache key for a call: method plus serialized params
pub fn cache_key(method: &str, params: &Value) -> String {
    format!("{}:{}", method, params)
}
