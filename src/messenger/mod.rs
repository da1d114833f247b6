//! Cross-context messaging
//!
//! Named endpoints expose method tables; callers address them through a
//! pluggable transport. The in-process bus is the default transport and
//! the only one the test suite needs, but nothing here assumes it.

pub mod router;
pub mod transport;

pub use router::MethodTable;
pub use transport::{InProcessBus, Transport};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a message is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    /// A single named endpoint
    Named { name: String },
    /// A specific frame within a named context
    Frame { context: String, frame: u32 },
    /// Every attached endpoint; replies are not collected
    Broadcast,
}

impl Target {
    pub fn named(name: impl Into<String>) -> Target {
        Target::Named { name: name.into() }
    }

    pub fn frame(context: impl Into<String>, frame: u32) -> Target {
        Target::Frame {
            context: context.into(),
            frame,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Named { name } => write!(f, "{}", name),
            Target::Frame { context, frame } => write!(f, "{}#{}", context, frame),
            Target::Broadcast => write!(f, "<broadcast>"),
        }
    }
}

/// An error that crossed a context boundary.
///
/// Only name, message, and optional structured data survive the trip;
/// the original error type does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SerializedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for SerializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Messaging failures
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("no handler registered for method '{method}'")]
    MethodNotFound { method: String },

    #[error("target '{target}' is not attached")]
    TargetMissing { target: String },

    #[error("target '{target}' has been invalidated")]
    ContextInvalidated { target: String },

    #[error("method '{method}' is already registered")]
    AlreadyRegistered { method: String },

    #[error("remote error: {0}")]
    Remote(SerializedError),

    #[error("broadcast targets cannot return a reply")]
    BroadcastReply,

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A single message in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub target: Target,
    pub method: String,
    pub params: Value,
    pub expects_reply: bool,
}

impl Envelope {
    pub fn request(target: Target, method: impl Into<String>, params: Value) -> Envelope {
        Envelope {
            id: Uuid::new_v4(),
            target,
            method: method.into(),
            params,
            expects_reply: true,
        }
    }

    pub fn notification(target: Target, method: impl Into<String>, params: Value) -> Envelope {
        Envelope {
            expects_reply: false,
            ..Envelope::request(target, method, params)
        }
    }
}

/// Caller-side facade over a transport.
#[derive(Clone)]
pub struct Messenger {
    transport: Arc<dyn Transport>,
}

impl Messenger {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invoke a method and wait for its reply.
    pub async fn call(
        &self,
        target: Target,
        method: &str,
        params: Value,
    ) -> Result<Value, MessengerError> {
        if target == Target::Broadcast {
            return Err(MessengerError::BroadcastReply);
        }
        let envelope = Envelope::request(target, method, params);
        let reply = self.transport.deliver(envelope).await?;
        Ok(reply.unwrap_or(Value::Null))
    }

    /// Fire-and-forget delivery. Valid for any target, including broadcast.
    pub async fn notify(
        &self,
        target: Target,
        method: &str,
        params: Value,
    ) -> Result<(), MessengerError> {
        let envelope = Envelope::notification(target, method, params);
        self.transport.deliver(envelope).await?;
        Ok(())
    }

    /// Bind a method on a target to a reusable callable handle. The target
    /// is resolved on every call, not when the handle is created.
    pub fn method(&self, name: impl Into<String>, target: Target) -> MethodHandle {
        MethodHandle {
            messenger: self.clone(),
            name: name.into(),
            target,
        }
    }

    /// Bind a fire-and-forget handle. Unlike [`Messenger::method`], the
    /// caller never observes a reply or a remote error.
    pub fn notifier(&self, name: impl Into<String>, target: Target) -> NotifierHandle {
        NotifierHandle {
            messenger: self.clone(),
            name: name.into(),
            target,
        }
    }
}

/// A request/reply method bound to one target
#[derive(Clone)]
pub struct MethodHandle {
    messenger: Messenger,
    name: String,
    target: Target,
}

impl MethodHandle {
    pub async fn call(&self, params: Value) -> Result<Value, MessengerError> {
        self.messenger
            .call(self.target.clone(), &self.name, params)
            .await
    }
}

/// A fire-and-forget method bound to one target
#[derive(Clone)]
pub struct NotifierHandle {
    messenger: Messenger,
    name: String,
    target: Target,
}

impl NotifierHandle {
    pub async fn notify(&self, params: Value) -> Result<(), MessengerError> {
        self.messenger
            .notify(self.target.clone(), &self.name, params)
            .await
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger").finish_non_exhaustive()
    }
}
