/// Central constants for the request governor and governance client
///
/// Tunables that callers are expected to override live in `config`; the
/// values here are wire-level names and fixed policy windows.

/// JSON-RPC method names routinely intercepted by the governor
pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_CALL: &str = "eth_call";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GET_BALANCE: &str = "eth_getBalance";
pub const NET_VERSION: &str = "net_version";

/// Methods that only read chain state. While the circuit breaker is open
/// these are served from cache or throttled; everything else is treated as
/// a write and proceeds after a shorter delay.
pub const READ_METHODS: &[&str] = &[
    ETH_ACCOUNTS,
    ETH_CHAIN_ID,
    ETH_CALL,
    ETH_BLOCK_NUMBER,
    ETH_GET_BALANCE,
    NET_VERSION,
];

/// Check whether a method is read-type for circuit-breaker policy
pub fn is_read_method(method: &str) -> bool {
    READ_METHODS.contains(&method)
}

/// Trailing window the call-rate tracker prunes its history to
pub const RATE_WINDOW_SECS: u64 = 60;

/// Cache entries are garbage-collected once older than 3x their method TTL
pub const SWEEP_TTL_FACTOR: u32 = 3;

/// Provider error code for a user-rejected wallet action (EIP-1193)
pub const USER_REJECTED_CODE: i64 = 4001;

/// Suggested wait before retrying a rate-limited endpoint; endpoints that
/// return 429 rarely include a Retry-After the wallet passes through
pub const RATE_LIMIT_RETRY_MS: u64 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_method_classification() {
        assert!(is_read_method(ETH_ACCOUNTS));
        assert!(is_read_method(ETH_CALL));
        assert!(!is_read_method(ETH_SEND_TRANSACTION));
        assert!(!is_read_method("personal_sign"));
    }
}
