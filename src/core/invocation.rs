//! Brick invocation domain model

use crate::core::expression::Expression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which window/frame a step should target when running in a frame-aware
/// host. Carried through unchanged; the in-process runtime only executes
/// in its own realm, but the messenger resolves frame targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTarget {
    #[serde(rename = "self")]
    Current,
    Top,
    AllFrames,
    Opener,
    Target,
    Broadcast,
}

/// A single configured step in a pipeline.
///
/// `instance_id` is assigned once when the pipeline is authored (or loaded
/// from a mod file) and correlates trace records across runs; it is never
/// regenerated during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrickInvocation {
    /// Registry id of the brick to run
    pub id: String,

    /// Stable per-step identity for trace correlation
    pub instance_id: Uuid,

    /// Human-readable label shown in errors and traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Context variable (without the `@` prefix) to bind the output under;
    /// falls back to the brick's default output key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Optional condition; a falsy rendered value skips the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expression>,

    /// Window targeting hint for frame-aware hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowTarget>,

    /// Named arguments, each an expression
    #[serde(default)]
    pub config: BTreeMap<String, Expression>,
}

impl BrickInvocation {
    /// Create an invocation with a fresh instance id and empty config
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance_id: Uuid::new_v4(),
            label: None,
            output_key: None,
            condition: None,
            window: None,
            config: BTreeMap::new(),
        }
    }

    /// Builder-style config entry
    pub fn with_config(mut self, key: impl Into<String>, expr: Expression) -> Self {
        self.config.insert(key.into(), expr);
        self
    }

    /// Builder-style output key
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Builder-style condition
    pub fn with_condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Builder-style label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
