//! Expression renderer
//!
//! Turns expression trees into concrete argument values. Rendering is a
//! pure function of (expression, context): it never mutates either, and a
//! pipeline expression renders to a thunk without executing anything.

use crate::core::{BrickInvocation, ExecutionContext, Expression};
use crate::render::path::parse_path;
use crate::render::template::{render_template, resolve_in_context};
use crate::render::RenderError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Rendering options
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// When set, a missing variable path is an error; otherwise it
    /// resolves to `null` (templates render it as the empty string)
    pub validate: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// A sub-pipeline captured as an argument: the steps plus the enclosing
/// context at render time. Executed only when a brick hands it to
/// `BrickOptions::run_pipeline`, never by rendering alone.
#[derive(Debug, Clone)]
pub struct PipelineThunk {
    pub steps: Vec<BrickInvocation>,
    pub bindings: ExecutionContext,
}

/// One rendered config entry: either a plain JSON value or a callable
/// sub-pipeline thunk.
#[derive(Debug, Clone)]
pub enum RenderedArg {
    Value(Value),
    Pipeline(PipelineThunk),
}

impl RenderedArg {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            RenderedArg::Value(v) => Some(v),
            RenderedArg::Pipeline(_) => None,
        }
    }

    pub fn as_pipeline(&self) -> Option<&PipelineThunk> {
        match self {
            RenderedArg::Pipeline(t) => Some(t),
            RenderedArg::Value(_) => None,
        }
    }
}

/// The fully rendered arguments for one brick call.
#[derive(Debug, Clone, Default)]
pub struct BrickArgs {
    entries: BTreeMap<String, RenderedArg>,
    secret_keys: BTreeSet<String>,
}

impl BrickArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, arg: RenderedArg, secret: bool) {
        let key = key.into();
        if secret {
            self.secret_keys.insert(key.clone());
        }
        self.entries.insert(key, arg);
    }

    pub fn get(&self, key: &str) -> Option<&RenderedArg> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(RenderedArg::as_value)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_i64)
    }

    pub fn pipeline(&self, key: &str) -> Option<&PipelineThunk> {
        self.entries.get(key).and_then(RenderedArg::as_pipeline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot for trace records: secret-sourced entries are redacted and
    /// sub-pipelines are summarized rather than dumped.
    pub fn redacted_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, arg) in &self.entries {
            let rendered = if self.secret_keys.contains(key) {
                Value::String("<redacted>".to_string())
            } else {
                match arg {
                    RenderedArg::Value(v) => v.clone(),
                    RenderedArg::Pipeline(t) => {
                        Value::String(format!("<pipeline: {} steps>", t.steps.len()))
                    }
                }
            };
            map.insert(key.clone(), rendered);
        }
        Value::Object(map)
    }
}

/// The argument renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Renderer that fails on missing variables
    pub fn strict() -> Self {
        Self::new(RenderOptions { validate: true })
    }

    /// Renderer that resolves missing variables to `null`
    pub fn lenient() -> Self {
        Self::new(RenderOptions { validate: false })
    }

    /// Render a single expression to an argument.
    pub fn render(
        &self,
        expr: &Expression,
        ctx: &ExecutionContext,
    ) -> Result<RenderedArg, RenderError> {
        Ok(self.render_entry(expr, ctx)?.0)
    }

    /// Render a single expression to a plain JSON value.
    ///
    /// Pipeline expressions have no value form; use [`Renderer::render`]
    /// for config entries that may carry sub-pipelines.
    pub fn render_value(
        &self,
        expr: &Expression,
        ctx: &ExecutionContext,
    ) -> Result<Value, RenderError> {
        match self.render_entry(expr, ctx)?.0 {
            RenderedArg::Value(v) => Ok(v),
            RenderedArg::Pipeline(_) => Err(RenderError::NestedPipeline),
        }
    }

    /// Render a whole config record, resolving every nested expression
    /// node before the result reaches the brick.
    pub fn render_config(
        &self,
        config: &BTreeMap<String, Expression>,
        ctx: &ExecutionContext,
    ) -> Result<BrickArgs, RenderError> {
        let mut args = BrickArgs::new();
        for (key, expr) in config {
            let (arg, secret) = self.render_entry(expr, ctx)?;
            args.insert(key.clone(), arg, secret);
        }
        Ok(args)
    }

    fn render_entry(
        &self,
        expr: &Expression,
        ctx: &ExecutionContext,
    ) -> Result<(RenderedArg, bool), RenderError> {
        match expr {
            Expression::Literal(value) => {
                let mut secret = false;
                let rendered = self.render_deep(value, ctx, &mut secret)?;
                Ok((RenderedArg::Value(rendered), secret))
            }
            Expression::Var(path) => {
                let (value, secret) = self.resolve_var(path, ctx)?;
                Ok((RenderedArg::Value(value), secret))
            }
            Expression::Template(text) => {
                let (rendered, secret) = render_template(text, ctx, self.options.validate)?;
                Ok((RenderedArg::Value(Value::String(rendered)), secret))
            }
            Expression::Pipeline(steps) => Ok((
                RenderedArg::Pipeline(PipelineThunk {
                    steps: steps.clone(),
                    bindings: ctx.clone(),
                }),
                false,
            )),
        }
    }

    fn resolve_var(
        &self,
        path: &str,
        ctx: &ExecutionContext,
    ) -> Result<(Value, bool), RenderError> {
        let segments = parse_path(path)?;
        match resolve_in_context(ctx, &segments) {
            Some((value, secret)) => Ok((value.clone(), secret)),
            None if self.options.validate => Err(RenderError::VariableNotDefined {
                path: path.to_string(),
            }),
            None => Ok((Value::Null, false)),
        }
    }

    /// Deep-walk a literal container, resolving any embedded tagged
    /// expression nodes in place. Depth-first, left to right.
    fn render_deep(
        &self,
        value: &Value,
        ctx: &ExecutionContext,
        secret: &mut bool,
    ) -> Result<Value, RenderError> {
        if Expression::is_tagged_node(value) {
            let expr = Expression::from_value(value.clone())
                .map_err(|e| RenderError::Expression(e.to_string()))?;
            let (arg, touched) = self.render_entry(&expr, ctx)?;
            *secret |= touched;
            return match arg {
                RenderedArg::Value(v) => Ok(v),
                RenderedArg::Pipeline(_) => Err(RenderError::NestedPipeline),
            };
        }

        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.render_deep(v, ctx, secret)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.render_deep(item, ctx, secret)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }
}
