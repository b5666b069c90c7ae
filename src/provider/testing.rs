//! Scriptable provider for tests
//!
//! Counts underlying invocations per method (the coalescing tests hinge on
//! this) and optionally delays each response so calls can be made to overlap.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::{EventListener, ListenerId, ListenerRegistry, ProviderError, WalletProvider};

type Handler = Box<dyn FnMut(&str, &Value) -> Result<Value, ProviderError> + Send>;

pub struct MockProvider {
    handler: Mutex<Handler>,
    calls: Mutex<HashMap<String, u64>>,
    delay: Mutex<Option<Duration>>,
    listeners: ListenerRegistry,
}

impl MockProvider {
    /// Provider answering every request with the same value
    pub fn with_result(value: Value) -> Self {
        Self::with_handler(move |_, _| Ok(value.clone()))
    }

    /// Provider driven by a custom (method, params) handler
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: FnMut(&str, &Value) -> Result<Value, ProviderError> + Send + 'static,
    {
        Self {
            handler: Mutex::new(Box::new(handler)),
            calls: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Delay every response, letting tests overlap in-flight requests
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Underlying invocations seen for one method
    pub fn call_count(&self, method: &str) -> u64 {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    /// Underlying invocations across all methods
    pub fn total_calls(&self) -> u64 {
        self.calls.lock().values().sum()
    }

    pub fn emit(&self, event: &str, payload: &Value) {
        self.listeners.emit(event, payload);
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        *self.calls.lock().entry(method.to_string()).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        (self.handler.lock())(method, &params)
    }

    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        self.listeners.remove(event, id);
    }
}
