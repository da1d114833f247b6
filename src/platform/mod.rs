//! Platform capability protocol
//!
//! Bricks never talk to a host directly; they go through a
//! `PlatformProtocol` that exposes optional capabilities. A host that
//! lacks a capability reports it honestly instead of silently no-oping,
//! so pipeline errors name the real problem.

pub mod local;
pub mod remote;

pub use local::LocalPlatform;
pub use remote::{register_platform_methods, RemotePlatform};

use crate::execution::AbortSignal;
use crate::messenger::MessengerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

/// The optional capabilities a host may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCapability {
    Alert,
    State,
    Badge,
    Clipboard,
}

impl PlatformCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformCapability::Alert => "alert",
            PlatformCapability::State => "state",
            PlatformCapability::Badge => "badge",
            PlatformCapability::Clipboard => "clipboard",
        }
    }
}

impl fmt::Display for PlatformCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformCapability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alert" => Ok(PlatformCapability::Alert),
            "state" => Ok(PlatformCapability::State),
            "badge" => Ok(PlatformCapability::Badge),
            "clipboard" => Ok(PlatformCapability::Clipboard),
            other => Err(format!("unknown capability '{other}'")),
        }
    }
}

/// Platform-layer failures
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform does not support the '{capability}' capability")]
    CapabilityNotSupported { capability: PlatformCapability },

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error("platform protocol error: {0}")]
    Protocol(String),
}

impl PlatformError {
    pub fn unsupported(capability: PlatformCapability) -> Self {
        PlatformError::CapabilityNotSupported { capability }
    }
}

/// A state value change, delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub namespace: String,
    pub key: String,
    pub value: Value,
}

/// Channel end a state subscriber listens on
pub type StateSender = mpsc::UnboundedSender<StateChange>;

#[async_trait]
pub trait AlertCapability: Send + Sync {
    async fn alert(&self, message: &str) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait StateCapability: Send + Sync {
    /// Read a key; missing keys resolve to `null`
    async fn get(&self, namespace: &str, key: &str) -> Result<Value, PlatformError>;

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), PlatformError>;

    /// Subscribe to changes in a namespace. The subscription lives until
    /// the abort signal fires; an already-aborted signal subscribes and
    /// immediately unsubscribes.
    async fn subscribe(
        &self,
        namespace: &str,
        sender: StateSender,
        signal: AbortSignal,
    ) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait BadgeCapability: Send + Sync {
    /// Set or clear (`None`) the badge text
    async fn set_badge(&self, text: Option<String>) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait ClipboardCapability: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), PlatformError>;
}

/// The host surface handed to bricks.
///
/// Default accessors report `CapabilityNotSupported`; a platform
/// overrides exactly the ones it implements.
pub trait PlatformProtocol: Send + Sync {
    /// Identifies the host in logs and errors
    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<PlatformCapability>;

    fn alert(&self) -> Result<&dyn AlertCapability, PlatformError> {
        Err(PlatformError::unsupported(PlatformCapability::Alert))
    }

    fn state(&self) -> Result<&dyn StateCapability, PlatformError> {
        Err(PlatformError::unsupported(PlatformCapability::State))
    }

    fn badge(&self) -> Result<&dyn BadgeCapability, PlatformError> {
        Err(PlatformError::unsupported(PlatformCapability::Badge))
    }

    fn clipboard(&self) -> Result<&dyn ClipboardCapability, PlatformError> {
        Err(PlatformError::unsupported(PlatformCapability::Clipboard))
    }
}
