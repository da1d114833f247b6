//! Pipeline execution engine
//!
//! Runs steps strictly in order, threading the copy-on-write context
//! from step to step. Sub-pipelines started by control-flow bricks run
//! inside the same run: same run id, same abort signal, same recorder.

use crate::core::{BrickInvocation, ExecutionContext, RunState};
use crate::execution::executor::{StepExecutor, StepOutcome};
use crate::execution::{AbortSignal, PipelineError};
use crate::platform::PlatformProtocol;
use crate::registry::{BrickError, BrickRegistry, SubPipelineRunner};
use crate::render::{PipelineThunk, Renderer};
use crate::trace::{NullTraceRecorder, TraceRecorder};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle notifications emitted while a pipeline runs
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        step_index: usize,
        brick_id: String,
        label: Option<String>,
    },
    StepSkipped {
        run_id: Uuid,
        step_index: usize,
        brick_id: String,
    },
    StepCompleted {
        run_id: Uuid,
        step_index: usize,
        brick_id: String,
    },
    RunCompleted {
        run_id: Uuid,
    },
    RunFailed {
        run_id: Uuid,
        error: String,
    },
    RunCancelled {
        run_id: Uuid,
    },
}

type EventHandler = Box<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// The result of a successful run
#[derive(Debug)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    /// Output of the last step that actually ran
    pub last_output: Value,
    /// Final variable environment
    pub context: ExecutionContext,
    pub state: RunState,
}

/// Sequential pipeline runner.
pub struct PipelineRunner {
    executor: StepExecutor,
    handlers: Vec<EventHandler>,
}

impl PipelineRunner {
    pub fn new(registry: Arc<BrickRegistry>, platform: Arc<dyn PlatformProtocol>) -> Self {
        Self::with_recorder(registry, platform, Arc::new(NullTraceRecorder))
    }

    pub fn with_recorder(
        registry: Arc<BrickRegistry>,
        platform: Arc<dyn PlatformProtocol>,
        recorder: Arc<dyn TraceRecorder>,
    ) -> Self {
        Self {
            executor: StepExecutor::new(registry, platform, recorder, Renderer::strict()),
            handlers: Vec::new(),
        }
    }

    pub fn with_renderer(
        registry: Arc<BrickRegistry>,
        platform: Arc<dyn PlatformProtocol>,
        recorder: Arc<dyn TraceRecorder>,
        renderer: Renderer,
    ) -> Self {
        Self {
            executor: StepExecutor::new(registry, platform, recorder, renderer),
            handlers: Vec::new(),
        }
    }

    /// Attach a lifecycle observer. Handlers run inline; keep them fast.
    pub fn on_event(mut self, handler: impl Fn(&ExecutionEvent) + Send + Sync + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Run a pipeline to completion.
    pub async fn run(
        self: Arc<Self>,
        steps: &[BrickInvocation],
        ctx: ExecutionContext,
        abort: AbortSignal,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut state = RunState::new();
        let run_id = state.run_id;
        state.start(steps.len());

        info!(run_id = %run_id, steps = steps.len(), "starting pipeline run");
        self.emit(ExecutionEvent::RunStarted {
            run_id,
            total_steps: steps.len(),
        });

        match Arc::clone(&self)
            .run_steps(run_id, steps, ctx, abort, Some(&mut state))
            .await
        {
            Ok((last_output, context)) => {
                state.complete();
                info!(run_id = %run_id, "pipeline run completed");
                self.emit(ExecutionEvent::RunCompleted { run_id });
                Ok(PipelineOutput {
                    run_id,
                    last_output,
                    context,
                    state,
                })
            }
            Err(PipelineError::Cancelled) => {
                state.cancel();
                info!(run_id = %run_id, "pipeline run cancelled");
                self.emit(ExecutionEvent::RunCancelled { run_id });
                Err(PipelineError::Cancelled)
            }
            Err(err) => {
                state.fail();
                info!(run_id = %run_id, error = %err, "pipeline run failed");
                self.emit(ExecutionEvent::RunFailed {
                    run_id,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_steps(
        self: Arc<Self>,
        run_id: Uuid,
        steps: &[BrickInvocation],
        mut ctx: ExecutionContext,
        abort: AbortSignal,
        mut state: Option<&mut RunState>,
    ) -> Result<(Value, ExecutionContext), PipelineError> {
        let runner: Arc<dyn SubPipelineRunner> = Arc::new(RunHandle {
            runner: Arc::clone(&self),
            run_id,
            abort: abort.clone(),
        });

        let mut last_output = Value::Null;
        for (step_index, step) in steps.iter().enumerate() {
            if abort.is_aborted() {
                return Err(PipelineError::Cancelled);
            }

            self.emit(ExecutionEvent::StepStarted {
                run_id,
                step_index,
                brick_id: step.id.clone(),
                label: step.label.clone(),
            });

            let outcome = self
                .executor
                .execute(
                    run_id,
                    step_index,
                    step,
                    &ctx,
                    abort.clone(),
                    Arc::clone(&runner),
                )
                .await?;

            match outcome {
                StepOutcome::Skipped => {
                    debug!(run_id = %run_id, brick = %step.id, "step skipped");
                    self.emit(ExecutionEvent::StepSkipped {
                        run_id,
                        step_index,
                        brick_id: step.id.clone(),
                    });
                }
                StepOutcome::Completed { output, bound_key } => {
                    if let Some(key) = bound_key {
                        ctx = ctx.with_binding(key, output.clone())?;
                    }
                    last_output = output;
                    self.emit(ExecutionEvent::StepCompleted {
                        run_id,
                        step_index,
                        brick_id: step.id.clone(),
                    });
                }
            }

            if let Some(state) = state.as_deref_mut() {
                state.completed_steps = step_index + 1;
            }
        }

        Ok((last_output, ctx))
    }
}

/// The engine's face inside a single run, handed to bricks so control
/// flow can recurse without owning the engine.
struct RunHandle {
    runner: Arc<PipelineRunner>,
    run_id: Uuid,
    abort: AbortSignal,
}

#[async_trait]
impl SubPipelineRunner for RunHandle {
    async fn run_sub_pipeline(
        &self,
        thunk: &PipelineThunk,
        extra_bindings: Vec<(String, Value)>,
    ) -> Result<Value, BrickError> {
        let mut ctx = thunk.bindings.clone();
        for (key, value) in extra_bindings {
            ctx = ctx.rebound(key, value);
        }

        let (output, _ctx) = Arc::clone(&self.runner)
            .run_steps(self.run_id, &thunk.steps, ctx, self.abort.clone(), None)
            .await?;
        Ok(output)
    }
}
