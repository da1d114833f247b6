//! Brick registry
//!
//! A brick is a named unit of work. The registry maps brick ids to
//! implementations; the executor looks bricks up here at each step.

pub mod builtins;

pub use builtins::builtin_registry;

use crate::execution::{AbortSignal, PipelineError};
use crate::platform::{PlatformError, PlatformProtocol};
use crate::render::{BrickArgs, PipelineThunk};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Brick-level failures.
///
/// `InvalidInput` and `Business` originate in the brick itself; the rest
/// wrap failures of the services a brick leans on.
#[derive(Debug, thiserror::Error)]
pub enum BrickError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Business(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Messenger(#[from] crate::messenger::MessengerError),

    #[error("sub-pipeline failed: {0}")]
    Pipeline(#[source] Box<PipelineError>),

    #[error("cancelled")]
    Cancelled,
}

impl From<PipelineError> for BrickError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => BrickError::Cancelled,
            other => BrickError::Pipeline(Box::new(other)),
        }
    }
}

/// Runs a pipeline thunk on behalf of a brick, inside the enclosing run.
///
/// Implemented by the execution engine; bricks only see it through
/// [`BrickOptions::run_pipeline`].
#[async_trait]
pub trait SubPipelineRunner: Send + Sync {
    /// Run the thunk with extra root bindings layered over its captured
    /// context. Binding keys carry the `@` prefix.
    async fn run_sub_pipeline(
        &self,
        thunk: &PipelineThunk,
        extra_bindings: Vec<(String, Value)>,
    ) -> Result<Value, BrickError>;
}

/// Per-call services handed to a brick alongside its rendered arguments.
#[derive(Clone)]
pub struct BrickOptions {
    pub run_id: Uuid,
    pub platform: Arc<dyn PlatformProtocol>,
    pub abort: AbortSignal,
    runner: Arc<dyn SubPipelineRunner>,
}

impl BrickOptions {
    pub fn new(
        run_id: Uuid,
        platform: Arc<dyn PlatformProtocol>,
        abort: AbortSignal,
        runner: Arc<dyn SubPipelineRunner>,
    ) -> Self {
        Self {
            run_id,
            platform,
            abort,
            runner,
        }
    }

    /// Run a pipeline-valued argument. The sub-run shares this run's id
    /// and abort signal.
    pub async fn run_pipeline(
        &self,
        thunk: &PipelineThunk,
        extra_bindings: Vec<(String, Value)>,
    ) -> Result<Value, BrickError> {
        self.runner.run_sub_pipeline(thunk, extra_bindings).await
    }
}

/// A named unit of work.
#[async_trait]
pub trait Brick: Send + Sync {
    /// Registry id, unique within a registry
    fn id(&self) -> &str;

    /// One-line description for listings
    fn description(&self) -> &str {
        ""
    }

    /// Context key (without `@`) the output binds under when the step
    /// does not name one; `None` means the output is discarded by default
    fn default_output_key(&self) -> Option<&str> {
        None
    }

    async fn run(&self, args: BrickArgs, options: &BrickOptions) -> Result<Value, BrickError>;
}

/// Registry lookup and registration failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("brick '{id}' is already registered")]
    Duplicate { id: String },

    #[error("brick '{id}' is not registered")]
    NotFound { id: String },
}

/// Maps brick ids to implementations.
#[derive(Default)]
pub struct BrickRegistry {
    bricks: RwLock<HashMap<String, Arc<dyn Brick>>>,
}

impl BrickRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brick under its own id
    pub fn register(&self, brick: Arc<dyn Brick>) -> Result<(), RegistryError> {
        let id = brick.id().to_string();
        let mut bricks = self.bricks.write().expect("registry lock");
        if bricks.contains_key(&id) {
            return Err(RegistryError::Duplicate { id });
        }
        bricks.insert(id, brick);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<dyn Brick>, RegistryError> {
        self.bricks
            .read()
            .expect("registry lock")
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bricks.read().expect("registry lock").contains_key(id)
    }

    /// Registered brick ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .bricks
            .read()
            .expect("registry lock")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for BrickRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrickRegistry").field("ids", &self.ids()).finish()
    }
}
