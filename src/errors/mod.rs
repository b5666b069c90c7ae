/// Structured error handling for the governance client
///
/// One enum per failure category with a thin top-level `ClientError` that the
/// rest of the crate passes around. Errors must stay `Clone` because results
/// are fanned out to every caller of a coalesced in-flight request.
use serde_json::Value;

use crate::constants::{RATE_LIMIT_RETRY_MS, USER_REJECTED_CODE};
use crate::provider::ProviderError;

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    // The user dismissed the wallet prompt
    UserRejected(String),

    // Network / RPC transport problems (retryable)
    Network(String),

    // The contract reverted or rejected the call
    ContractRevert(String),

    // Internal throttling by the governor (retryable, normally invisible)
    Throttled { retry_in_ms: u64 },

    // Response did not have the expected shape
    DataShape(String),

    // Missing or invalid configuration
    Configuration(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::UserRejected(msg) => write!(f, "Rejected by user: {}", msg),
            ClientError::Network(msg) => write!(f, "Network Error: {}", msg),
            ClientError::ContractRevert(msg) => write!(f, "Contract Revert: {}", msg),
            ClientError::Throttled { retry_in_ms } => {
                write!(f, "Throttled, retry in {}ms", retry_in_ms)
            }
            ClientError::DataShape(msg) => write!(f, "Unexpected Data Shape: {}", msg),
            ClientError::Configuration(msg) => write!(f, "Configuration Error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// Whether the retry policy should attempt this error again.
    ///
    /// User rejections and contract reverts are deterministic; retrying them
    /// only re-prompts the wallet or re-burns gas estimation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::Throttled { .. }
        )
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        match err {
            // Rate-limit responses (429 and friends) carry a suggested wait
            // so the retry policy backs off instead of hammering the endpoint
            ProviderError::Transport(msg) if is_rate_limit_error(&msg) => ClientError::Throttled {
                retry_in_ms: RATE_LIMIT_RETRY_MS,
            },
            ProviderError::Transport(msg) => ClientError::Network(msg),
            ProviderError::MalformedResponse(msg) => ClientError::DataShape(msg),
            ProviderError::Rpc {
                code,
                message,
                data,
            } => classify_rpc_error(code, message, data),
        }
    }
}

/// Sort a JSON-RPC error object into the client taxonomy
///
/// EIP-1193 code 4001 is a user rejection; "revert" anywhere in the message
/// (or nested data) is a contract error; everything else is treated as a
/// transport-level problem and stays retryable.
fn classify_rpc_error(code: i64, message: String, data: Option<Value>) -> ClientError {
    if code == USER_REJECTED_CODE {
        return ClientError::UserRejected(message);
    }

    let detail = data
        .as_ref()
        .map(|d| extract_error_message(d))
        .unwrap_or_default();
    let combined = format!("{} {}", message, detail).to_lowercase();

    if combined.contains("revert") || combined.contains("execution reverted") || code == 3 {
        let msg = if detail.is_empty() { message } else { detail };
        return ClientError::ContractRevert(msg);
    }

    ClientError::Network(format!("RPC error {}: {}", code, message))
}

/// Best-effort message extraction from a provider error object
///
/// Wallet providers disagree on where the human-readable message lives, so
/// probe the common spots before falling back to the raw JSON.
pub fn extract_error_message(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }

    for path in [
        &["message"][..],
        &["reason"][..],
        &["data", "message"][..],
        &["error", "message"][..],
    ] {
        let mut current = value;
        let mut found = true;
        for segment in path {
            match current.get(segment) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(s) = current.as_str() {
                return s.to_string();
            }
        }
    }

    value.to_string()
}

/// Check if an error string looks like a rate-limit response
pub fn is_rate_limit_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();
    error_lower.contains("429")
        || error_lower.contains("too many requests")
        || error_lower.contains("rate limit")
}
