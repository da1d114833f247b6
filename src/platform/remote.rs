//! Platform access across contexts
//!
//! A `RemotePlatform` forwards capability calls over the messenger to a
//! host that exposed its own platform with
//! [`register_platform_methods`]. The wire surface is two methods:
//! `platform.capabilities` and `platform.invoke`.

use crate::execution::AbortSignal;
use crate::messenger::{Messenger, MessengerError, MethodTable, SerializedError, Target};
use crate::platform::{
    AlertCapability, BadgeCapability, ClipboardCapability, PlatformCapability, PlatformError,
    PlatformProtocol, StateCapability, StateSender,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

const CAPABILITIES_METHOD: &str = "platform.capabilities";
const INVOKE_METHOD: &str = "platform.invoke";

/// One capability call on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CapabilityRequest {
    capability: PlatformCapability,
    action: String,
    #[serde(default)]
    params: Value,
}

/// A platform whose capabilities live in another context.
pub struct RemotePlatform {
    messenger: Messenger,
    target: Target,
    capabilities: Vec<PlatformCapability>,
}

impl RemotePlatform {
    /// Wrap a target whose capability list is already known
    pub fn new(messenger: Messenger, target: Target, capabilities: Vec<PlatformCapability>) -> Self {
        Self {
            messenger,
            target,
            capabilities,
        }
    }

    /// Connect to a target and ask it what it supports
    pub async fn connect(messenger: Messenger, target: Target) -> Result<Self, PlatformError> {
        let reply = messenger
            .call(target.clone(), CAPABILITIES_METHOD, Value::Null)
            .await?;
        let capabilities: Vec<PlatformCapability> = serde_json::from_value(reply)
            .map_err(|e| PlatformError::Protocol(format!("bad capability list: {e}")))?;
        Ok(Self::new(messenger, target, capabilities))
    }

    async fn invoke(
        &self,
        capability: PlatformCapability,
        action: &str,
        params: Value,
    ) -> Result<Value, PlatformError> {
        let request = CapabilityRequest {
            capability,
            action: action.to_string(),
            params,
        };
        let params = serde_json::to_value(&request)
            .map_err(|e| PlatformError::Protocol(e.to_string()))?;

        match self.messenger.call(self.target.clone(), INVOKE_METHOD, params).await {
            Ok(value) => Ok(value),
            Err(MessengerError::Remote(err)) => Err(deserialize_platform_error(err, capability)),
            Err(other) => Err(PlatformError::Messenger(other)),
        }
    }

    fn require(&self, capability: PlatformCapability) -> Result<(), PlatformError> {
        if self.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(PlatformError::unsupported(capability))
        }
    }
}

impl PlatformProtocol for RemotePlatform {
    fn name(&self) -> &str {
        "remote"
    }

    fn capabilities(&self) -> Vec<PlatformCapability> {
        self.capabilities.clone()
    }

    fn alert(&self) -> Result<&dyn AlertCapability, PlatformError> {
        self.require(PlatformCapability::Alert)?;
        Ok(self)
    }

    fn state(&self) -> Result<&dyn StateCapability, PlatformError> {
        self.require(PlatformCapability::State)?;
        Ok(self)
    }

    fn badge(&self) -> Result<&dyn BadgeCapability, PlatformError> {
        self.require(PlatformCapability::Badge)?;
        Ok(self)
    }

    fn clipboard(&self) -> Result<&dyn ClipboardCapability, PlatformError> {
        self.require(PlatformCapability::Clipboard)?;
        Ok(self)
    }
}

#[async_trait]
impl AlertCapability for RemotePlatform {
    async fn alert(&self, message: &str) -> Result<(), PlatformError> {
        self.invoke(
            PlatformCapability::Alert,
            "show",
            json!({ "message": message }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StateCapability for RemotePlatform {
    async fn get(&self, namespace: &str, key: &str) -> Result<Value, PlatformError> {
        self.invoke(
            PlatformCapability::State,
            "get",
            json!({ "namespace": namespace, "key": key }),
        )
        .await
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), PlatformError> {
        self.invoke(
            PlatformCapability::State,
            "set",
            json!({ "namespace": namespace, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        _namespace: &str,
        _sender: StateSender,
        _signal: AbortSignal,
    ) -> Result<(), PlatformError> {
        // Subscriptions need a streaming channel the request/reply wire
        // surface does not carry
        Err(PlatformError::Protocol(
            "state subscriptions are not available across contexts".to_string(),
        ))
    }
}

#[async_trait]
impl BadgeCapability for RemotePlatform {
    async fn set_badge(&self, text: Option<String>) -> Result<(), PlatformError> {
        self.invoke(PlatformCapability::Badge, "set", json!({ "text": text }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClipboardCapability for RemotePlatform {
    async fn write_text(&self, text: &str) -> Result<(), PlatformError> {
        self.invoke(
            PlatformCapability::Clipboard,
            "write",
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }
}

/// Expose a platform's capabilities on a method table so other contexts
/// can reach it through [`RemotePlatform`].
pub fn register_platform_methods(
    table: &MethodTable,
    platform: Arc<dyn PlatformProtocol>,
) -> Result<(), MessengerError> {
    let for_capabilities = Arc::clone(&platform);
    table.register(CAPABILITIES_METHOD, move |_params| {
        let platform = Arc::clone(&for_capabilities);
        async move {
            serde_json::to_value(platform.capabilities())
                .map_err(|e| SerializedError::new("SerializationError", e.to_string()))
        }
    })?;

    table.register(INVOKE_METHOD, move |params| {
        let platform = Arc::clone(&platform);
        async move {
            let request: CapabilityRequest = serde_json::from_value(params)
                .map_err(|e| SerializedError::new("ProtocolError", e.to_string()))?;
            handle_invoke(platform.as_ref(), request)
                .await
                .map_err(serialize_platform_error)
        }
    })?;

    Ok(())
}

async fn handle_invoke(
    platform: &dyn PlatformProtocol,
    request: CapabilityRequest,
) -> Result<Value, PlatformError> {
    let params = &request.params;
    match (request.capability, request.action.as_str()) {
        (PlatformCapability::Alert, "show") => {
            let message = require_str(params, "message")?;
            platform.alert()?.alert(message).await?;
            Ok(Value::Null)
        }
        (PlatformCapability::State, "get") => {
            let namespace = require_str(params, "namespace")?;
            let key = require_str(params, "key")?;
            platform.state()?.get(namespace, key).await
        }
        (PlatformCapability::State, "set") => {
            let namespace = require_str(params, "namespace")?;
            let key = require_str(params, "key")?;
            let value = params.get("value").cloned().unwrap_or(Value::Null);
            platform.state()?.set(namespace, key, value).await?;
            Ok(Value::Null)
        }
        (PlatformCapability::Badge, "set") => {
            let text = params
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string);
            platform.badge()?.set_badge(text).await?;
            Ok(Value::Null)
        }
        (PlatformCapability::Clipboard, "write") => {
            let text = require_str(params, "text")?;
            platform.clipboard()?.write_text(text).await?;
            Ok(Value::Null)
        }
        (capability, action) => Err(PlatformError::Protocol(format!(
            "unknown action '{action}' for capability '{capability}'"
        ))),
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, PlatformError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| PlatformError::Protocol(format!("missing string field '{field}'")))
}

fn serialize_platform_error(err: PlatformError) -> SerializedError {
    match &err {
        PlatformError::CapabilityNotSupported { capability } => {
            SerializedError::new("CapabilityNotSupported", err.to_string())
                .with_data(json!({ "capability": capability.as_str() }))
        }
        PlatformError::Protocol(_) => SerializedError::new("ProtocolError", err.to_string()),
        PlatformError::Messenger(_) => SerializedError::new("MessengerError", err.to_string()),
    }
}

fn deserialize_platform_error(
    err: SerializedError,
    requested: PlatformCapability,
) -> PlatformError {
    if err.name == "CapabilityNotSupported" {
        let capability = err
            .data
            .as_ref()
            .and_then(|d| d.get("capability"))
            .and_then(Value::as_str)
            .and_then(|s| PlatformCapability::from_str(s).ok())
            .unwrap_or(requested);
        PlatformError::CapabilityNotSupported { capability }
    } else {
        PlatformError::Messenger(MessengerError::Remote(err))
    }
}
