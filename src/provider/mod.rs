//! Wallet provider seam
//!
//! The governor wraps anything with the standard injected-provider shape:
//! `request({method, params})` plus `on`/`removeListener` for provider
//! events (accountsChanged, chainChanged, disconnect). `HttpProvider` talks
//! JSON-RPC over HTTP; `MockProvider` is scriptable test support.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub mod http;
pub mod testing;

pub use http::HttpProvider;
pub use testing::MockProvider;

/// Callback invoked with the event payload
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by `on`, accepted by `remove_listener`
pub type ListenerId = u64;

/// Errors surfaced by a wallet provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connection, timeout, HTTP status)
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a JSON-RPC error object
    #[error("provider returned JSON-RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The response had neither a result nor an error
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// The injected-provider shape the governor intercepts
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Issue a raw JSON-RPC request
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to a provider event
    fn on(&self, event: &str, listener: EventListener) -> ListenerId;

    /// Unsubscribe a previously registered listener
    fn remove_listener(&self, event: &str, id: ListenerId);
}

/// Shared listener bookkeeping for provider implementations
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, EventListener)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&self, event: &str, id: ListenerId) {
        if let Some(entries) = self.listeners.lock().get_mut(event) {
            entries.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    /// Dispatch an event to all listeners registered for it
    ///
    /// Callbacks run outside the lock so a listener may re-subscribe.
    pub fn emit(&self, event: &str, payload: &Value) {
        let snapshot: Vec<EventListener> = self
            .listeners
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .get(event)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_register_emit_and_remove() {
        let registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let id = registry.add(
            "chainChanged",
            Arc::new(move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.emit("chainChanged", &json!("0x1"));
        registry.emit("accountsChanged", &json!([]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        registry.remove("chainChanged", id);
        registry.emit("chainChanged", &json!("0x2"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count("chainChanged"), 0);
    }
}
