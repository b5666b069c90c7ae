/// Configuration schemas - all config structures defined once with defaults
///
/// Every struct uses the `config_struct!` macro (single-source definition,
/// embedded defaults, serde support). Runtime overrides come from environment
/// variables since this library has no CLI surface.
use std::collections::HashMap;

use crate::config_struct;
use crate::constants;

pub mod macros;

// ============================================================================
// REQUEST GOVERNOR CONFIGURATION
// ============================================================================

/// Per-method response TTLs in milliseconds
///
/// Account and chain identity change rarely; contract reads go stale fast.
fn default_method_ttls() -> HashMap<String, u64> {
    let mut ttls = HashMap::new();
    ttls.insert(constants::ETH_ACCOUNTS.to_string(), 30_000);
    ttls.insert(constants::ETH_CHAIN_ID.to_string(), 3_600_000);
    ttls.insert(constants::ETH_CALL.to_string(), 8_000);
    ttls.insert(constants::ETH_BLOCK_NUMBER.to_string(), 4_000);
    ttls.insert(constants::ETH_GET_BALANCE.to_string(), 15_000);
    ttls
}

/// Per-method calls-per-second limits before the debounce path kicks in
fn default_method_limits() -> HashMap<String, u32> {
    let mut limits = HashMap::new();
    limits.insert(constants::ETH_ACCOUNTS.to_string(), 4);
    limits.insert(constants::ETH_CHAIN_ID.to_string(), 4);
    limits.insert(constants::ETH_CALL.to_string(), 12);
    limits
}

config_struct! {
    /// Request governor tunables
    ///
    /// Two overload tiers on purpose: the per-second/per-minute limits only
    /// add backoff latency, while `trip_threshold` over `trip_window_secs`
    /// is the hard gate that opens the circuit breaker.
    pub struct GovernorConfig {
        // Soft thresholds (tracker backoff)
        calls_per_second_limit: u32 = 8,
        calls_per_minute_limit: u32 = 120,

        // Hard threshold (circuit breaker trip)
        trip_threshold: u32 = 50,
        trip_window_secs: u64 = 10,

        // Circuit breaker timing
        cooldown_secs: u64 = 15,
        open_read_delay_ms: u64 = 3_000,
        open_write_delay_ms: u64 = 1_000,

        // Debounce
        debounce_delay_ms: u64 = 250,
        method_call_limit_default: u32 = 6,
        method_call_limits: HashMap<String, u32> = default_method_limits(),

        // Adaptive backoff clamp
        min_backoff_ms: u64 = 500,
        max_backoff_ms: u64 = 30_000,

        // Response cache
        default_ttl_ms: u64 = 5_000,
        method_ttl_ms: HashMap<String, u64> = default_method_ttls(),
        sweep_interval_secs: u64 = 30,
    }
}

impl GovernorConfig {
    /// Overlay environment overrides onto the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ttl) = read_env_u64("GOVCLIENT_DEFAULT_TTL_MS") {
            config.default_ttl_ms = ttl;
        }
        if let Some(cooldown) = read_env_u64("GOVCLIENT_BREAKER_COOLDOWN_SECS") {
            config.cooldown_secs = cooldown;
        }
        if let Some(limit) = read_env_u64("GOVCLIENT_CALLS_PER_SECOND") {
            config.calls_per_second_limit = limit as u32;
        }
        config
    }
}

// ============================================================================
// RETRY CONFIGURATION
// ============================================================================

config_struct! {
    /// Uniform retry policy for proposal-fetch operations
    pub struct RetryConfig {
        max_attempts: u32 = 3,
        base_delay_ms: u64 = 500,
        max_delay_ms: u64 = 8_000,
        multiplier: f64 = 2.0,
        /// Jitter fraction applied to each delay (0.0 to 0.5)
        jitter: f64 = 0.1,
    }
}

// ============================================================================
// CLIENT CONFIGURATION
// ============================================================================

config_struct! {
    /// Endpoint and contract addressing
    pub struct ClientConfig {
        rpc_url: String = "http://127.0.0.1:8545".to_string(),
        chain_id: u64 = 31337,
        governance_address: String = String::new(),
        token_address: String = String::new(),
        session_path: String = ".govclient-session.json".to_string(),
    }
}

impl ClientConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("GOVCLIENT_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(chain_id) = read_env_u64("GOVCLIENT_CHAIN_ID") {
            config.chain_id = chain_id;
        }
        if let Ok(addr) = std::env::var("GOVCLIENT_GOVERNANCE_ADDRESS") {
            config.governance_address = addr;
        }
        if let Ok(addr) = std::env::var("GOVCLIENT_TOKEN_ADDRESS") {
            config.token_address = addr;
        }
        if let Ok(path) = std::env::var("GOVCLIENT_SESSION_PATH") {
            config.session_path = path;
        }
        config
    }
}

fn read_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
