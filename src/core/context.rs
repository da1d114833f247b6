//! Execution context - the evolving variable environment of a run
//!
//! Bindings are copy-on-write: merging a step output produces a new
//! context, so earlier snapshots stay valid for tracing and staleness
//! comparison in debugging UIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Error produced when a binding would silently overwrite an earlier one
#[derive(Debug, thiserror::Error)]
#[error("context variable {key} is already bound")]
pub struct BindingCollision {
    pub key: String,
}

/// The variable environment visible to a pipeline run.
///
/// Keys carry the `@` prefix (`@input`, `@options`, step output keys).
/// Two runs never share a context; cloning is cheap enough for the
/// copy-on-write discipline given typical pipeline sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    vars: BTreeMap<String, Value>,

    /// Root variable names whose values are secret-sourced; rendered
    /// arguments derived from them are redacted before tracing
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    secrets: BTreeSet<String>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with `@input` and `@options`
    pub fn seeded(input: Value, options: Value) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("@input".to_string(), input);
        vars.insert("@options".to_string(), options);
        Self {
            vars,
            secrets: BTreeSet::new(),
        }
    }

    /// Look up a root variable by its `@`-prefixed name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Whether a root variable exists
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Return a new context with an additional binding.
    ///
    /// `key` must carry the `@` prefix. Earlier bindings are never
    /// overwritten implicitly; a collision is a caller error.
    pub fn with_binding(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<ExecutionContext, BindingCollision> {
        let key = key.into();
        if self.vars.contains_key(&key) {
            return Err(BindingCollision { key });
        }
        let mut next = self.clone();
        next.vars.insert(key, value);
        Ok(next)
    }

    /// Return a new context with a binding added or replaced.
    ///
    /// Loop-scoped bindings (`@element`, `@error`) legitimately shadow an
    /// outer binding of the same name, so no collision check here.
    pub fn rebound(&self, key: impl Into<String>, value: Value) -> ExecutionContext {
        let mut next = self.clone();
        next.vars.insert(key.into(), value);
        next
    }

    /// Mark a root variable as secret-sourced (e.g. integration credentials)
    pub fn mark_secret(&mut self, key: impl Into<String>) {
        self.secrets.insert(key.into());
    }

    /// Whether a root variable is secret-sourced
    pub fn is_secret(&self, key: &str) -> bool {
        self.secrets.contains(key)
    }

    /// Iterate over root bindings in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    /// Number of root bindings
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Snapshot the whole environment as a JSON object, with secret-sourced
    /// roots redacted. Used for trace dumps and debugging output.
    pub fn redacted_snapshot(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.vars {
            if self.secrets.contains(key) {
                map.insert(key.clone(), Value::String("<redacted>".to_string()));
            } else {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}
