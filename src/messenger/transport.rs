//! Transports
//!
//! A transport moves envelopes to endpoints. The in-process bus keeps
//! everything in one address space; a browser-extension style host would
//! provide its own transport over its native messaging channel.

use crate::messenger::{Envelope, MessengerError, MethodTable, Target};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Envelope delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver an envelope to its target. Returns the reply value when
    /// the envelope expects one and the target produced one.
    async fn deliver(&self, envelope: Envelope) -> Result<Option<Value>, MessengerError>;
}

struct Endpoint {
    table: Arc<MethodTable>,
    valid: bool,
}

/// In-process transport keyed by endpoint name.
///
/// Frame targets resolve to `context#frame` keys. An invalidated endpoint
/// stays attached but refuses delivery, mirroring a torn-down page whose
/// name is still known to callers.
#[derive(Default)]
pub struct InProcessBus {
    endpoints: RwLock<HashMap<String, Endpoint>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a named endpoint. Re-attaching replaces the previous table
    /// and clears any invalidation.
    pub fn attach(&self, name: impl Into<String>, table: Arc<MethodTable>) {
        let name = name.into();
        debug!(endpoint = %name, "attaching endpoint");
        self.endpoints
            .write()
            .expect("bus lock")
            .insert(name, Endpoint { table, valid: true });
    }

    /// Attach a frame endpoint within a named context
    pub fn attach_frame(&self, context: &str, frame: u32, table: Arc<MethodTable>) {
        self.attach(frame_key(context, frame), table);
    }

    /// Mark an endpoint (and its frames) as gone. Later deliveries fail
    /// with `ContextInvalidated`.
    pub fn invalidate(&self, name: &str) {
        debug!(endpoint = %name, "invalidating endpoint");
        let prefix = format!("{}#", name);
        let mut endpoints = self.endpoints.write().expect("bus lock");
        for (key, endpoint) in endpoints.iter_mut() {
            if key == name || key.starts_with(&prefix) {
                endpoint.valid = false;
            }
        }
    }

    /// Remove an endpoint entirely. Later deliveries fail with
    /// `TargetMissing`.
    pub fn detach(&self, name: &str) {
        self.endpoints.write().expect("bus lock").remove(name);
    }

    fn resolve(&self, target: &Target) -> Result<Arc<MethodTable>, MessengerError> {
        let key = match target {
            Target::Named { name } => name.clone(),
            Target::Frame { context, frame } => frame_key(context, *frame),
            Target::Broadcast => unreachable!("broadcast resolved by caller"),
        };
        let endpoints = self.endpoints.read().expect("bus lock");
        match endpoints.get(&key) {
            None => Err(MessengerError::TargetMissing { target: key }),
            Some(endpoint) if !endpoint.valid => {
                Err(MessengerError::ContextInvalidated { target: key })
            }
            Some(endpoint) => Ok(Arc::clone(&endpoint.table)),
        }
    }

    fn valid_tables(&self) -> Vec<Arc<MethodTable>> {
        self.endpoints
            .read()
            .expect("bus lock")
            .values()
            .filter(|e| e.valid)
            .map(|e| Arc::clone(&e.table))
            .collect()
    }
}

fn frame_key(context: &str, frame: u32) -> String {
    format!("{}#{}", context, frame)
}

#[async_trait]
impl Transport for InProcessBus {
    async fn deliver(&self, envelope: Envelope) -> Result<Option<Value>, MessengerError> {
        match &envelope.target {
            Target::Broadcast => {
                if envelope.expects_reply {
                    return Err(MessengerError::BroadcastReply);
                }
                // Endpoints without the method are simply not interested
                for table in self.valid_tables() {
                    if table.has_method(&envelope.method) {
                        let _ = table
                            .dispatch(&envelope.method, envelope.params.clone())
                            .await;
                    }
                }
                Ok(None)
            }
            target => {
                let table = self.resolve(target)?;
                let reply = table.dispatch(&envelope.method, envelope.params).await?;
                Ok(envelope.expects_reply.then_some(reply))
            }
        }
    }
}
