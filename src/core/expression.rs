//! Expression domain model
//!
//! Brick config entries are expressions: literal values, `@`-variable
//! references, template strings, or nested sub-pipelines. An expression is
//! immutable once constructed; rendering produces new values and never
//! mutates the node.

use crate::core::invocation::BrickInvocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged expression node.
///
/// Serialized form: `{ "kind": "literal" | "var" | "template" | "pipeline",
/// "value": ... }`. Plain JSON scalars and containers in a config are
/// literals; tagged maps embedded inside literal containers are picked up
/// by the renderer's deep walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Expression {
    /// A JSON value used as-is (containers may embed further tagged nodes)
    Literal(Value),

    /// A dotted/bracket path resolved against the context, e.g. `@foo.bar[0]`
    Var(String),

    /// A template string interpolated against the context, e.g. `hi {{ @name }}`
    Template(String),

    /// A nested ordered list of brick invocations, passed to a brick as a
    /// callable thunk and never executed by rendering alone
    Pipeline(Vec<BrickInvocation>),
}

/// Error parsing a raw config value into an expression
#[derive(Debug, thiserror::Error)]
#[error("invalid expression: {0}")]
pub struct ExpressionParseError(pub String);

impl Expression {
    /// Parse a raw JSON config value into an expression.
    ///
    /// A map with exactly the keys `kind` and `value` (and a recognized
    /// kind) is a tagged expression node; anything else is a literal.
    pub fn from_value(value: Value) -> Result<Expression, ExpressionParseError> {
        if Self::is_tagged_node(&value) {
            serde_json::from_value(value).map_err(|e| ExpressionParseError(e.to_string()))
        } else {
            Ok(Expression::Literal(value))
        }
    }

    /// Check whether a JSON value is a tagged expression node.
    pub fn is_tagged_node(value: &Value) -> bool {
        match value {
            Value::Object(map) => {
                map.len() == 2
                    && map.contains_key("value")
                    && matches!(
                        map.get("kind").and_then(Value::as_str),
                        Some("literal" | "var" | "template" | "pipeline")
                    )
            }
            _ => false,
        }
    }

    /// Convenience constructor for a literal expression
    pub fn literal(value: impl Into<Value>) -> Expression {
        Expression::Literal(value.into())
    }

    /// Convenience constructor for a var expression
    pub fn var(path: impl Into<String>) -> Expression {
        Expression::Var(path.into())
    }

    /// Convenience constructor for a template expression
    pub fn template(text: impl Into<String>) -> Expression {
        Expression::Template(text.into())
    }
}

/// JavaScript-style truthiness, used for step conditions.
///
/// `null`, `false`, `0`, and the empty string are falsy; everything else
/// (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
