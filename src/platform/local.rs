//! In-process platform
//!
//! Backs every capability with process-local storage. This is the
//! platform the CLI runs pipelines against and the one the test suite
//! inspects.

use crate::execution::AbortSignal;
use crate::platform::{
    AlertCapability, BadgeCapability, ClipboardCapability, PlatformCapability, PlatformError,
    PlatformProtocol, StateCapability, StateChange, StateSender,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

type Listeners = Arc<Mutex<HashMap<String, Vec<(u64, StateSender)>>>>;

/// A platform that supports every capability locally.
#[derive(Default)]
pub struct LocalPlatform {
    alerts: Mutex<Vec<String>>,
    state: RwLock<HashMap<String, HashMap<String, Value>>>,
    listeners: Listeners,
    next_listener_id: AtomicU64,
    badge: Mutex<Option<String>>,
    clipboard: Mutex<Option<String>>,
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts shown so far, oldest first
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().expect("alerts lock").clone()
    }

    /// Current badge text
    pub fn badge_text(&self) -> Option<String> {
        self.badge.lock().expect("badge lock").clone()
    }

    /// Last clipboard write
    pub fn clipboard_text(&self) -> Option<String> {
        self.clipboard.lock().expect("clipboard lock").clone()
    }

    fn notify_listeners(&self, change: StateChange) {
        let mut listeners = self.listeners.lock().expect("listeners lock");
        if let Some(entries) = listeners.get_mut(&change.namespace) {
            // Drop listeners whose receiving half is gone
            entries.retain(|(_, sender)| sender.send(change.clone()).is_ok());
        }
    }
}

impl PlatformProtocol for LocalPlatform {
    fn name(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> Vec<PlatformCapability> {
        vec![
            PlatformCapability::Alert,
            PlatformCapability::State,
            PlatformCapability::Badge,
            PlatformCapability::Clipboard,
        ]
    }

    fn alert(&self) -> Result<&dyn AlertCapability, PlatformError> {
        Ok(self)
    }

    fn state(&self) -> Result<&dyn StateCapability, PlatformError> {
        Ok(self)
    }

    fn badge(&self) -> Result<&dyn BadgeCapability, PlatformError> {
        Ok(self)
    }

    fn clipboard(&self) -> Result<&dyn ClipboardCapability, PlatformError> {
        Ok(self)
    }
}

#[async_trait]
impl AlertCapability for LocalPlatform {
    async fn alert(&self, message: &str) -> Result<(), PlatformError> {
        info!(alert = %message, "platform alert");
        self.alerts
            .lock()
            .expect("alerts lock")
            .push(message.to_string());
        Ok(())
    }
}

#[async_trait]
impl StateCapability for LocalPlatform {
    async fn get(&self, namespace: &str, key: &str) -> Result<Value, PlatformError> {
        let state = self.state.read().expect("state lock");
        Ok(state
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), PlatformError> {
        {
            let mut state = self.state.write().expect("state lock");
            state
                .entry(namespace.to_string())
                .or_default()
                .insert(key.to_string(), value.clone());
        }
        self.notify_listeners(StateChange {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        namespace: &str,
        sender: StateSender,
        signal: AbortSignal,
    ) -> Result<(), PlatformError> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let namespace = namespace.to_string();
        {
            let mut listeners = self.listeners.lock().expect("listeners lock");
            listeners
                .entry(namespace.clone())
                .or_default()
                .push((id, sender));
        }

        let listeners = Arc::clone(&self.listeners);
        tokio::spawn(async move {
            signal.aborted().await;
            let mut listeners = listeners.lock().expect("listeners lock");
            if let Some(entries) = listeners.get_mut(&namespace) {
                entries.retain(|(listener_id, _)| *listener_id != id);
            }
        });
        Ok(())
    }
}

#[async_trait]
impl BadgeCapability for LocalPlatform {
    async fn set_badge(&self, text: Option<String>) -> Result<(), PlatformError> {
        *self.badge.lock().expect("badge lock") = text;
        Ok(())
    }
}

#[async_trait]
impl ClipboardCapability for LocalPlatform {
    async fn write_text(&self, text: &str) -> Result<(), PlatformError> {
        *self.clipboard.lock().expect("clipboard lock") = Some(text.to_string());
        Ok(())
    }
}
