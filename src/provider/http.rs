//! HTTP JSON-RPC wallet provider
//!
//! Posts JSON-RPC 2.0 payloads to a single endpoint. Rate-limit responses
//! (HTTP 429) surface as transport errors whose message matches the
//! rate-limit detection in `errors::is_rate_limit_error`, so the retry
//! policy treats them as retryable.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::logger::{self, LogTag};

use super::{EventListener, ListenerId, ListenerRegistry, ProviderError, WalletProvider};

/// Default request timeout
const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
    listeners: ListenerRegistry,
}

impl HttpProvider {
    pub fn new(url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {}", e)))?;

        logger::info(
            LogTag::Provider,
            &format!("HTTP provider initialized for {}", url),
        );

        Ok(Self {
            url: url.to_string(),
            client,
            request_id: AtomicU64::new(1),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Dispatch a provider event to registered listeners
    ///
    /// An HTTP transport has no push channel of its own; callers polling for
    /// account or chain changes use this to fan the change out.
    pub fn emit(&self, event: &str, payload: &Value) {
        self.listeners.emit(event, payload);
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::SeqCst),
            "method": method,
            "params": params,
        });

        logger::verbose(
            LogTag::Provider,
            &format!("-> {} {}", method, payload["params"]),
        );

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            logger::warning(
                LogTag::Provider,
                &format!("{} returned 429 for {}", self.url, method),
            );
            return Err(ProviderError::Transport(
                "HTTP 429 Too Many Requests".to_string(),
            ));
        }

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-32603);
            let message = crate::errors::extract_error_message(error);
            return Err(ProviderError::Rpc {
                code,
                message,
                data: error.get("data").cloned(),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ProviderError::MalformedResponse("missing result field".to_string()))
    }

    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        self.listeners.remove(event, id);
    }
}
