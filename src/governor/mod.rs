//! Request governor: the interception layer around the wallet provider
//!
//! Every governed call runs the same pipeline: circuit-breaker policy ->
//! hard call-volume trip check -> pending-request dedup -> response cache ->
//! rate tracking with adaptive backoff -> per-method debounce -> the real
//! provider call. Two concurrent
//! calls for the same cache key share one in-flight future, so at most one
//! real network call per key is outstanding at a time.
//!
//! A `RequestGovernor` is an explicit instance (cheap to clone, all state
//! behind `Arc`) rather than module-level globals, so tests and independent
//! consumers each get their own cache, counters, and breaker.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::GovernorConfig;
use crate::constants::is_read_method;
use crate::errors::ClientError;
use crate::logger::{self, LogTag};
use crate::provider::WalletProvider;

pub mod cache;
pub mod circuit_breaker;
pub mod rate_tracker;

pub use cache::{cache_key, ResponseCache};
pub use circuit_breaker::{BreakerCheck, CircuitBreaker};
pub use rate_tracker::{CallRateTracker, RateLimits};

/// One in-flight call, shared between coalesced awaiters
type SharedCall = Shared<BoxFuture<'static, Result<Value, ClientError>>>;

/// Counters for observability; mirrors what callers used to eyeball in
/// devtools network tabs
#[derive(Debug, Clone)]
pub struct GovernorStats {
    pub calls_per_method: HashMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub coalesced: u64,
    pub debounced: u64,
    pub backoff_waits: u64,
    pub breaker_trips: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for GovernorStats {
    fn default() -> Self {
        Self {
            calls_per_method: HashMap::new(),
            cache_hits: 0,
            cache_misses: 0,
            coalesced: 0,
            debounced: 0,
            backoff_waits: 0,
            breaker_trips: 0,
            started_at: Utc::now(),
        }
    }
}

impl GovernorStats {
    pub fn total_calls(&self) -> u64 {
        self.calls_per_method.values().sum()
    }
}

struct GovernorInner {
    provider: Arc<dyn WalletProvider>,
    config: GovernorConfig,
    cache: ResponseCache,
    tracker: CallRateTracker,
    breaker: CircuitBreaker,
    pending: Mutex<HashMap<String, SharedCall>>,
    debounce_gens: Mutex<HashMap<String, u64>>,
    // Every intercepted call, cache hits included; drives the breaker trip
    call_log: Mutex<Vec<Instant>>,
    stats: Mutex<GovernorStats>,
    last_sweep: Mutex<Instant>,
}

#[derive(Clone)]
pub struct RequestGovernor {
    inner: Arc<GovernorInner>,
}

impl RequestGovernor {
    pub fn new(provider: Arc<dyn WalletProvider>, config: GovernorConfig) -> Self {
        let cache = ResponseCache::new(config.default_ttl_ms, &config.method_ttl_ms);
        let tracker = CallRateTracker::new(RateLimits {
            per_second: config.calls_per_second_limit,
            per_minute: config.calls_per_minute_limit,
            min_backoff_ms: config.min_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        });
        let breaker = CircuitBreaker::new(Duration::from_secs(config.cooldown_secs));

        Self {
            inner: Arc::new(GovernorInner {
                provider,
                config,
                cache,
                tracker,
                breaker,
                pending: Mutex::new(HashMap::new()),
                debounce_gens: Mutex::new(HashMap::new()),
                call_log: Mutex::new(Vec::new()),
                stats: Mutex::new(GovernorStats::default()),
                last_sweep: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Issue a governed request
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let key = cache_key(method, &params);
        self.record_stat(method);
        self.maybe_sweep();

        match self.inner.breaker.check() {
            BreakerCheck::Open(_) => {
                return self.request_while_open(method, params, &key).await;
            }
            BreakerCheck::JustClosed => self.clear_after_close(),
            BreakerCheck::Closed => {}
        }

        // Hard limit: total interception volume, cache hits included. The
        // tracker's soft limits only see cache misses and only add latency;
        // this separate count is what actually opens the breaker.
        let recent = self.record_call();
        if recent > self.inner.config.trip_threshold {
            self.inner.stats.lock().breaker_trips += 1;
            self.inner.breaker.trip(&format!(
                "{} calls within {}s",
                recent, self.inner.config.trip_window_secs
            ));
            return self.request_while_open(method, params, &key).await;
        }

        // Coalesce onto an existing in-flight call for this key
        if let Some(shared) = self.pending_call(&key) {
            self.inner.stats.lock().coalesced += 1;
            return shared.await;
        }

        // Fresh cached value
        if let Some(value) = self.inner.cache.get(&key) {
            self.inner.stats.lock().cache_hits += 1;
            return Ok(value);
        }
        self.inner.stats.lock().cache_misses += 1;

        // Soft limits: slow down, do not refuse
        if self.inner.tracker.record(method) {
            let backoff = self.inner.tracker.backoff();
            self.inner.stats.lock().backoff_waits += 1;
            logger::debug(
                LogTag::Governor,
                &format!(
                    "Over rate limit ({} calls/s), backing off {}ms",
                    self.inner.tracker.calls_last_second(),
                    backoff.as_millis()
                ),
            );
            tokio::time::sleep(backoff).await;
        }

        // Per-method burst: debounce, newest call for a key wins
        let method_limit = self
            .inner
            .config
            .method_call_limits
            .get(method)
            .copied()
            .unwrap_or(self.inner.config.method_call_limit_default);
        if self.inner.tracker.method_calls_last_second(method) > method_limit {
            self.inner.stats.lock().debounced += 1;
            let my_gen = self.bump_generation(&key);
            tokio::time::sleep(Duration::from_millis(self.inner.config.debounce_delay_ms)).await;

            if self.current_generation(&key) != my_gen {
                // Superseded while waiting; resolve from whatever the newer
                // call produced rather than issuing another network call
                if let Some(shared) = self.pending_call(&key) {
                    return shared.await;
                }
                if let Some(value) = self.inner.cache.get_stale(&key) {
                    return Ok(value);
                }
                return Ok(Value::Null);
            }
        }

        self.issue_call(method, params, &key).await
    }

    /// Open-state policy: cached reads are free, everything else pays a delay
    async fn request_while_open(
        &self,
        method: &str,
        params: Value,
        key: &str,
    ) -> Result<Value, ClientError> {
        if is_read_method(method) {
            if let Some(value) = self.inner.cache.get_stale(key) {
                self.inner.stats.lock().cache_hits += 1;
                return Ok(value);
            }

            tokio::time::sleep(Duration::from_millis(self.inner.config.open_read_delay_ms)).await;
            match self.call_provider(method, params).await {
                Ok(value) => {
                    self.inner.cache.set(method, key, value.clone());
                    Ok(value)
                }
                Err(e) => {
                    // Reads degrade to null while the breaker is open so the
                    // UI keeps rendering from last-known-good state
                    logger::warning(
                        LogTag::Governor,
                        &format!("Swallowing {} failure while circuit open: {}", method, e),
                    );
                    Ok(Value::Null)
                }
            }
        } else {
            tokio::time::sleep(Duration::from_millis(self.inner.config.open_write_delay_ms)).await;
            self.call_provider(method, params).await
        }
    }

    /// Issue the real call, publishing it in the pending map until settled
    async fn issue_call(&self, method: &str, params: Value, key: &str) -> Result<Value, ClientError> {
        let shared = {
            let mut pending = self.inner.pending.lock();
            if let Some(existing) = pending.get(key) {
                // Lost the race to another caller; join it
                existing.clone()
            } else {
                let inner = self.inner.clone();
                let method = method.to_string();
                let key_owned = key.to_string();
                let call = async move {
                    let result = inner
                        .provider
                        .request(&method, params)
                        .await
                        .map_err(ClientError::from);
                    if let Ok(ref value) = result {
                        inner.cache.set(&method, &key_owned, value.clone());
                    }
                    // Entry removed whether the call succeeded or failed
                    inner.pending.lock().remove(&key_owned);
                    result
                }
                .boxed()
                .shared();
                pending.insert(key.to_string(), call.clone());
                call
            }
        };

        shared.await
    }

    async fn call_provider(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.inner
            .provider
            .request(method, params)
            .await
            .map_err(ClientError::from)
    }

    /// Manually close the breaker, clearing cache and counters
    pub fn reset_circuit_breaker(&self) {
        self.inner.breaker.force_close();
        self.clear_after_close();
    }

    fn clear_after_close(&self) {
        self.inner.cache.clear();
        self.inner.tracker.clear();
        self.inner.call_log.lock().clear();
        logger::info(LogTag::Governor, "🧹 Cache cleared and counters reset");
    }

    /// Record one intercepted call, returning how many landed within the
    /// trip window
    fn record_call(&self) -> u32 {
        let now = Instant::now();
        let window = Duration::from_secs(self.inner.config.trip_window_secs);
        let mut log = self.inner.call_log.lock();
        log.retain(|t| now.duration_since(*t) < window);
        log.push(now);
        log.len() as u32
    }

    fn pending_call(&self, key: &str) -> Option<SharedCall> {
        self.inner.pending.lock().get(key).cloned()
    }

    fn bump_generation(&self, key: &str) -> u64 {
        let mut gens = self.inner.debounce_gens.lock();
        let entry = gens.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn current_generation(&self, key: &str) -> u64 {
        self.inner
            .debounce_gens
            .lock()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn record_stat(&self, method: &str) {
        let mut stats = self.inner.stats.lock();
        *stats.calls_per_method.entry(method.to_string()).or_insert(0) += 1;
    }

    fn maybe_sweep(&self) {
        let interval = Duration::from_secs(self.inner.config.sweep_interval_secs);
        {
            let mut last = self.inner.last_sweep.lock();
            if last.elapsed() < interval {
                return;
            }
            *last = Instant::now();
        }
        let removed = self.inner.cache.sweep();
        if removed > 0 {
            logger::debug(
                LogTag::Cache,
                &format!("Sweep removed {} expired entries", removed),
            );
        }
    }

    pub fn stats(&self) -> GovernorStats {
        self.inner.stats.lock().clone()
    }

    pub fn breaker_open(&self) -> bool {
        self.inner.breaker.is_open()
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockProvider, ProviderError};
    use serde_json::json;

    fn test_config() -> GovernorConfig {
        let mut config = GovernorConfig::default();
        // Generous soft limits so pipeline tests exercise one stage at a time
        config.calls_per_second_limit = 1_000;
        config.calls_per_minute_limit = 10_000;
        config.method_call_limit_default = 1_000;
        config.method_call_limits.clear();
        config.trip_threshold = 1_000;
        config
    }

    fn governor(provider: Arc<MockProvider>, config: GovernorConfig) -> RequestGovernor {
        RequestGovernor::new(provider, config)
    }

    #[tokio::test]
    async fn concurrent_calls_for_one_key_coalesce() {
        let provider = Arc::new(MockProvider::with_result(json!("0xabc")));
        provider.set_delay(Duration::from_millis(80));
        let gov = governor(provider.clone(), test_config());

        let (a, b) = tokio::join!(
            gov.request("eth_chainId", json!([])),
            gov.request("eth_chainId", json!([]))
        );

        assert_eq!(a.unwrap(), json!("0xabc"));
        assert_eq!(b.unwrap(), json!("0xabc"));
        assert_eq!(provider.call_count("eth_chainId"), 1);
        assert_eq!(gov.stats().coalesced, 1);
    }

    #[tokio::test]
    async fn fresh_cache_short_circuits_network() {
        let provider = Arc::new(MockProvider::with_result(json!(["0xdead"])));
        let gov = governor(provider.clone(), test_config());

        let first = gov.request("eth_accounts", json!([])).await.unwrap();
        let second = gov.request("eth_accounts", json!([])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.call_count("eth_accounts"), 1);
        assert_eq!(gov.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn distinct_params_do_not_share_cache_entries() {
        let provider = Arc::new(MockProvider::with_handler(|_, params| {
            Ok(params[0]["to"].clone())
        }));
        let gov = governor(provider.clone(), test_config());

        let a = gov
            .request("eth_call", json!([{"to": "0x1"}, "latest"]))
            .await
            .unwrap();
        let b = gov
            .request("eth_call", json!([{"to": "0x2"}, "latest"]))
            .await
            .unwrap();

        assert_eq!(a, json!("0x1"));
        assert_eq!(b, json!("0x2"));
        assert_eq!(provider.call_count("eth_call"), 2);
    }

    #[tokio::test]
    async fn errors_propagate_and_are_not_cached() {
        let mut fail_first = true;
        let provider = Arc::new(MockProvider::with_handler(move |_, _| {
            if fail_first {
                fail_first = false;
                Err(ProviderError::Transport("connection refused".to_string()))
            } else {
                Ok(json!("0x1"))
            }
        }));
        let gov = governor(provider.clone(), test_config());

        let err = gov.request("eth_chainId", json!([])).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));

        let ok = gov.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(ok, json!("0x1"));
        assert_eq!(provider.call_count("eth_chainId"), 2);
    }

    #[tokio::test]
    async fn call_storm_trips_breaker_then_serves_cached_reads_instantly() {
        // Stock configuration: trip threshold 50 over 10s, eth_accounts
        // cached for 30s, so calls 2..=50 are pure cache hits
        let provider = Arc::new(MockProvider::with_result(json!(["0xdead"])));
        let gov = governor(provider.clone(), GovernorConfig::default());

        for _ in 0..60 {
            let _ = gov.request("eth_accounts", json!([])).await;
        }
        assert!(gov.breaker_open());
        // Only the first call reached the network; the storm rode the cache
        // and still opened the breaker on total interception volume
        assert_eq!(provider.call_count("eth_accounts"), 1);

        // Cached read answers instantly while open
        let started = Instant::now();
        let value = gov.request("eth_accounts", json!([])).await.unwrap();
        assert_eq!(value, json!(["0xdead"]));
        assert!(started.elapsed() < Duration::from_millis(200));

        // Manual reset closes the breaker and empties the cache
        gov.reset_circuit_breaker();
        assert!(!gov.breaker_open());
        assert_eq!(gov.cache_len(), 0);
    }

    #[tokio::test]
    async fn storm_of_cache_misses_also_trips_breaker() {
        let provider = Arc::new(MockProvider::with_handler(|_, _| Ok(json!("0x1"))));
        let mut config = test_config();
        config.trip_threshold = 10;
        config.open_read_delay_ms = 20;
        // Distinct params defeat the cache; every call is a real miss
        let gov = governor(provider.clone(), config);

        for i in 0..12 {
            let _ = gov
                .request("eth_call", json!([{"to": format!("0x{}", i)}]))
                .await;
        }
        assert!(gov.breaker_open());
        assert_eq!(gov.stats().breaker_trips, 1);
    }

    #[tokio::test]
    async fn open_breaker_read_without_cache_waits_and_swallows_errors() {
        let provider = Arc::new(MockProvider::with_handler(|_, _| {
            Err(ProviderError::Transport("down".to_string()))
        }));
        let mut config = test_config();
        config.open_read_delay_ms = 120;
        let gov = governor(provider.clone(), config);

        gov.inner.breaker.trip("test");

        let started = Instant::now();
        let value = gov.request("eth_call", json!([{"to": "0x1"}])).await.unwrap();
        assert_eq!(value, Value::Null);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn open_breaker_write_is_delayed_but_errors_propagate() {
        let provider = Arc::new(MockProvider::with_handler(|_, _| {
            Err(ProviderError::Rpc {
                code: 4001,
                message: "User rejected the request.".to_string(),
                data: None,
            })
        }));
        let mut config = test_config();
        config.open_write_delay_ms = 80;
        let gov = governor(provider.clone(), config);

        gov.inner.breaker.trip("test");

        let started = Instant::now();
        let err = gov
            .request("eth_sendTransaction", json!([{"to": "0x1"}]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UserRejected(_)));
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn breaker_auto_close_clears_cache() {
        let provider = Arc::new(MockProvider::with_result(json!("0x1")));
        let mut config = test_config();
        config.cooldown_secs = 0; // immediate auto-close on next check
        let gov = governor(provider.clone(), config);

        let _ = gov.request("eth_chainId", json!([])).await;
        assert_eq!(gov.cache_len(), 1);

        gov.inner.breaker.trip("test");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _ = gov.request("eth_chainId", json!([])).await;
        assert!(!gov.breaker_open());
        // Old entry was cleared on close; the new call repopulated one entry
        assert_eq!(provider.call_count("eth_chainId"), 2);
    }

    #[tokio::test]
    async fn per_method_burst_is_debounced() {
        let provider = Arc::new(MockProvider::with_result(json!("0x1")));
        let mut config = test_config();
        config.method_call_limits.insert("eth_call".to_string(), 2);
        config.method_ttl_ms.insert("eth_call".to_string(), 0);
        config.debounce_delay_ms = 30;
        let gov = governor(provider.clone(), config);

        for _ in 0..5 {
            let _ = gov.request("eth_call", json!([{"to": "0x1"}])).await;
        }
        assert!(gov.stats().debounced >= 1);
    }
}
