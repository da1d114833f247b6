//! Built-in bricks
//!
//! The standard library of bricks: plumbing (`echo`, `concat`, `delay`,
//! `fail`), platform access (`alert`, `get-state`, `set-state`), and
//! control flow (`if-else`, `for-each`, `try-catch`).

use crate::core::is_truthy;
use crate::registry::{Brick, BrickError, BrickOptions, BrickRegistry};
use crate::render::BrickArgs;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// A registry pre-loaded with every built-in brick.
pub fn builtin_registry() -> BrickRegistry {
    let registry = BrickRegistry::new();
    let bricks: Vec<Arc<dyn Brick>> = vec![
        Arc::new(Echo),
        Arc::new(Concat),
        Arc::new(Delay),
        Arc::new(Fail),
        Arc::new(Alert),
        Arc::new(GetState),
        Arc::new(SetState),
        Arc::new(IfElse),
        Arc::new(ForEach),
        Arc::new(TryCatch),
    ];
    for brick in bricks {
        registry
            .register(brick)
            .expect("builtin ids are distinct");
    }
    registry
}

fn required<'a>(args: &'a BrickArgs, key: &str) -> Result<&'a Value, BrickError> {
    args.value(key)
        .ok_or_else(|| BrickError::InvalidInput(format!("missing required argument '{key}'")))
}

fn required_str<'a>(args: &'a BrickArgs, key: &str) -> Result<&'a str, BrickError> {
    required(args, key)?
        .as_str()
        .ok_or_else(|| BrickError::InvalidInput(format!("argument '{key}' must be a string")))
}

struct Echo;

#[async_trait]
impl Brick for Echo {
    fn id(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the message argument unchanged"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("echo")
    }

    async fn run(&self, args: BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        let message = required(&args, "message")?;
        Ok(json!({ "message": message }))
    }
}

struct Concat;

#[async_trait]
impl Brick for Concat {
    fn id(&self) -> &str {
        "concat"
    }

    fn description(&self) -> &str {
        "Join string values with an optional separator"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("concat")
    }

    async fn run(&self, args: BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        let values = required(&args, "values")?
            .as_array()
            .ok_or_else(|| BrickError::InvalidInput("'values' must be an array".to_string()))?;
        let separator = args.string("separator").unwrap_or("");

        let parts: Vec<String> = values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        Ok(Value::String(parts.join(separator)))
    }
}

struct Delay;

#[async_trait]
impl Brick for Delay {
    fn id(&self) -> &str {
        "delay"
    }

    fn description(&self) -> &str {
        "Wait a number of milliseconds"
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let ms = args
            .integer("ms")
            .ok_or_else(|| BrickError::InvalidInput("'ms' must be an integer".to_string()))?;
        let ms = u64::try_from(ms)
            .map_err(|_| BrickError::InvalidInput("'ms' must be non-negative".to_string()))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(Value::Null),
            _ = options.abort.aborted() => Err(BrickError::Cancelled),
        }
    }
}

struct Fail;

#[async_trait]
impl Brick for Fail {
    fn id(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Fail with the given message"
    }

    async fn run(&self, args: BrickArgs, _options: &BrickOptions) -> Result<Value, BrickError> {
        let message = args.string("message").unwrap_or("failure brick ran");
        Err(BrickError::Business(message.to_string()))
    }
}

struct Alert;

#[async_trait]
impl Brick for Alert {
    fn id(&self) -> &str {
        "alert"
    }

    fn description(&self) -> &str {
        "Show a platform alert"
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let message = required_str(&args, "message")?;
        options.platform.alert()?.alert(message).await?;
        Ok(Value::Null)
    }
}

struct GetState;

#[async_trait]
impl Brick for GetState {
    fn id(&self) -> &str {
        "get-state"
    }

    fn description(&self) -> &str {
        "Read a value from platform state"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("state")
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let namespace = args.string("namespace").unwrap_or("mod");
        let key = required_str(&args, "key")?;
        Ok(options.platform.state()?.get(namespace, key).await?)
    }
}

struct SetState;

#[async_trait]
impl Brick for SetState {
    fn id(&self) -> &str {
        "set-state"
    }

    fn description(&self) -> &str {
        "Write a value into platform state"
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let namespace = args.string("namespace").unwrap_or("mod").to_string();
        let key = required_str(&args, "key")?.to_string();
        let value = required(&args, "value")?.clone();
        options
            .platform
            .state()?
            .set(&namespace, &key, value.clone())
            .await?;
        Ok(value)
    }
}

struct IfElse;

#[async_trait]
impl Brick for IfElse {
    fn id(&self) -> &str {
        "if-else"
    }

    fn description(&self) -> &str {
        "Run one of two sub-pipelines based on a condition"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("branch")
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let condition = required(&args, "condition")?;
        let branch = if is_truthy(condition) { "then" } else { "else" };

        match args.pipeline(branch) {
            Some(thunk) => options.run_pipeline(thunk, Vec::new()).await,
            // A missing else branch is a no-op
            None if branch == "else" => Ok(Value::Null),
            None => Err(BrickError::InvalidInput(
                "'then' must be a pipeline".to_string(),
            )),
        }
    }
}

struct ForEach;

#[async_trait]
impl Brick for ForEach {
    fn id(&self) -> &str {
        "for-each"
    }

    fn description(&self) -> &str {
        "Run a sub-pipeline once per element, binding @element"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("results")
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let elements = required(&args, "elements")?
            .as_array()
            .ok_or_else(|| BrickError::InvalidInput("'elements' must be an array".to_string()))?
            .clone();
        let body = args
            .pipeline("body")
            .ok_or_else(|| BrickError::InvalidInput("'body' must be a pipeline".to_string()))?;

        let mut results = Vec::with_capacity(elements.len());
        for element in elements {
            if options.abort.is_aborted() {
                return Err(BrickError::Cancelled);
            }
            let output = options
                .run_pipeline(body, vec![("@element".to_string(), element)])
                .await?;
            results.push(output);
        }
        Ok(Value::Array(results))
    }
}

struct TryCatch;

#[async_trait]
impl Brick for TryCatch {
    fn id(&self) -> &str {
        "try-catch"
    }

    fn description(&self) -> &str {
        "Run a sub-pipeline, routing failures to a catch pipeline"
    }

    fn default_output_key(&self) -> Option<&str> {
        Some("result")
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError> {
        let body = args
            .pipeline("try")
            .ok_or_else(|| BrickError::InvalidInput("'try' must be a pipeline".to_string()))?;

        match options.run_pipeline(body, Vec::new()).await {
            Ok(value) => Ok(value),
            // Cancellation is not an error the catch branch may swallow
            Err(BrickError::Cancelled) => Err(BrickError::Cancelled),
            Err(err) => match args.pipeline("catch") {
                Some(catch) => {
                    let error = json!({ "message": err.to_string() });
                    options
                        .run_pipeline(catch, vec![("@error".to_string(), error)])
                        .await
                }
                None => Err(err),
            },
        }
    }
}
