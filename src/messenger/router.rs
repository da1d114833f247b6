//! Method registration and dispatch for one endpoint

use crate::messenger::{MessengerError, SerializedError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

type MethodResult = Result<Value, SerializedError>;
type BoxedHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

/// The set of methods one endpoint answers.
///
/// Registration happens at setup time; dispatch may run concurrently.
/// Handlers receive the raw params value and return a value or a
/// serialized error.
#[derive(Default)]
pub struct MethodTable {
    handlers: RwLock<HashMap<String, BoxedHandler>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a method name. Registering the same name
    /// twice is an error; replacing a live handler would race in-flight
    /// dispatches.
    pub fn register<F, Fut>(&self, method: &str, handler: F) -> Result<(), MessengerError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let mut handlers = self.handlers.write().expect("method table lock");
        if handlers.contains_key(method) {
            return Err(MessengerError::AlreadyRegistered {
                method: method.to_string(),
            });
        }
        let boxed: BoxedHandler = Arc::new(move |params| Box::pin(handler(params)));
        handlers.insert(method.to_string(), boxed);
        Ok(())
    }

    /// Whether a method is registered
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers
            .read()
            .expect("method table lock")
            .contains_key(method)
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .expect("method table lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Dispatch a call to the registered handler.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, MessengerError> {
        let handler = {
            let handlers = self.handlers.read().expect("method table lock");
            handlers.get(method).cloned()
        };
        let handler = handler.ok_or_else(|| MessengerError::MethodNotFound {
            method: method.to_string(),
        })?;
        handler(params).await.map_err(MessengerError::Remote)
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.method_names())
            .finish()
    }
}
