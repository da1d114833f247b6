//! Mod configuration from YAML
//!
//! A mod file declares a named pipeline: options, secrets, and an ordered
//! list of brick steps. Config entries are raw values; tagged expression
//! maps (`{ kind: var, value: "@input.x" }`) become typed expressions,
//! everything else is a literal.

use crate::core::context::ExecutionContext;
use crate::core::expression::Expression;
use crate::core::invocation::{BrickInvocation, WindowTarget};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Top-level mod configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModConfig {
    /// Mod name
    pub name: String,

    /// Mod version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Mod options, seeded into the context as `@options`
    #[serde(default)]
    pub options: BTreeMap<String, serde_yaml::Value>,

    /// Integration secrets, seeded as `@secrets` and redacted in traces
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    /// Pipeline steps in execution order
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Registry id of the brick to run
    pub brick: String,

    /// Stable instance id; generated at load time when absent
    #[serde(default)]
    pub instance_id: Option<Uuid>,

    /// Human-readable step label
    #[serde(default)]
    pub label: Option<String>,

    /// Context variable to bind the output under
    #[serde(default)]
    pub output_key: Option<String>,

    /// Optional condition expression (raw value, parsed like config entries)
    #[serde(default)]
    pub condition: Option<serde_yaml::Value>,

    /// Window targeting hint
    #[serde(default)]
    pub window: Option<WindowTarget>,

    /// Brick arguments
    #[serde(default)]
    pub config: BTreeMap<String, serde_yaml::Value>,
}

impl ModConfig {
    /// Load a mod configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse mod YAML")
    }

    /// Load a mod configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read mod file {}", path.as_ref().display()))?;
        Self::from_yaml(&content)
    }

    /// Convert the configured steps into brick invocations.
    ///
    /// Instance ids missing from the file are generated here, once; the
    /// resulting invocations keep them for the lifetime of the loaded mod.
    pub fn to_steps(&self) -> Result<Vec<BrickInvocation>> {
        self.steps
            .iter()
            .map(|step| step.to_invocation())
            .collect()
    }

    /// Build the initial execution context: `@input` from CLI/caller
    /// overrides, `@options` and `@secrets` from the mod file.
    pub fn initial_context(&self, input: &[(String, String)]) -> Result<ExecutionContext> {
        let mut input_map = serde_json::Map::new();
        for (key, raw) in input {
            // Accept JSON values on the command line, fall back to strings
            let value = serde_json::from_str(raw).unwrap_or(Value::String(raw.clone()));
            input_map.insert(key.clone(), value);
        }

        let options = yaml_map_to_json(&self.options)?;
        let mut ctx = ExecutionContext::seeded(Value::Object(input_map), options);

        if !self.secrets.is_empty() {
            let secrets: serde_json::Map<String, Value> = self
                .secrets
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            ctx = ctx
                .with_binding("@secrets", Value::Object(secrets))
                .expect("fresh context cannot collide on @secrets");
            ctx.mark_secret("@secrets");
        }

        Ok(ctx)
    }
}

impl StepConfig {
    fn to_invocation(&self) -> Result<BrickInvocation> {
        let mut config = BTreeMap::new();
        for (key, raw) in &self.config {
            let json = yaml_to_json(raw)?;
            let expr = Expression::from_value(json)
                .with_context(|| format!("Invalid config entry '{}' for brick {}", key, self.brick))?;
            config.insert(key.clone(), expr);
        }

        let condition = match &self.condition {
            Some(raw) => {
                let json = yaml_to_json(raw)?;
                Some(
                    Expression::from_value(json)
                        .with_context(|| format!("Invalid condition for brick {}", self.brick))?,
                )
            }
            None => None,
        };

        Ok(BrickInvocation {
            id: self.brick.clone(),
            instance_id: self.instance_id.unwrap_or_else(Uuid::new_v4),
            label: self.label.clone(),
            output_key: self.output_key.clone(),
            condition,
            window: self.window,
            config,
        })
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value> {
    serde_json::to_value(value).context("Mod config value is not JSON-compatible")
}

fn yaml_map_to_json(map: &BTreeMap<String, serde_yaml::Value>) -> Result<Value> {
    let mut out = serde_json::Map::new();
    for (key, value) in map {
        out.insert(key.clone(), yaml_to_json(value)?);
    }
    Ok(Value::Object(out))
}
