//! Single-step execution
//!
//! Renders a step's condition and config, runs the brick, and writes the
//! trace records around it. Binding the output into the context is the
//! engine's job.

use crate::core::{is_truthy, BrickInvocation, ExecutionContext};
use crate::execution::{AbortSignal, PipelineError};
use crate::platform::PlatformProtocol;
use crate::registry::{BrickError, BrickOptions, BrickRegistry, RegistryError, SubPipelineRunner};
use crate::render::Renderer;
use crate::trace::{TraceEntry, TraceExit, TraceOutcome, TraceRecorder};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// What a step produced
#[derive(Debug)]
pub enum StepOutcome {
    /// Condition was falsy; nothing ran
    Skipped,
    /// Brick ran; `bound_key` is the `@`-prefixed context key the engine
    /// should bind the output under, when the step wants one
    Completed {
        output: Value,
        bound_key: Option<String>,
    },
}

/// Executes one step at a time.
pub struct StepExecutor {
    registry: Arc<BrickRegistry>,
    platform: Arc<dyn PlatformProtocol>,
    recorder: Arc<dyn TraceRecorder>,
    renderer: Renderer,
}

impl StepExecutor {
    pub fn new(
        registry: Arc<BrickRegistry>,
        platform: Arc<dyn PlatformProtocol>,
        recorder: Arc<dyn TraceRecorder>,
        renderer: Renderer,
    ) -> Self {
        Self {
            registry,
            platform,
            recorder,
            renderer,
        }
    }

    pub async fn execute(
        &self,
        run_id: Uuid,
        step_index: usize,
        step: &BrickInvocation,
        ctx: &ExecutionContext,
        abort: AbortSignal,
        runner: Arc<dyn SubPipelineRunner>,
    ) -> Result<StepOutcome, PipelineError> {
        if let Some(condition) = &step.condition {
            // Conditions render leniently: an unbound variable means
            // "not yet", which skips the step rather than failing the run
            let value = Renderer::lenient().render_value(condition, ctx)?;
            if !is_truthy(&value) {
                debug!(brick = %step.id, index = step_index, "condition falsy, skipping step");
                self.trace_skip(run_id, step_index, step).await;
                return Ok(StepOutcome::Skipped);
            }
        }

        let brick = self.registry.lookup(&step.id).map_err(|err| match err {
            RegistryError::NotFound { id } => PipelineError::BrickNotFound { id },
            RegistryError::Duplicate { id } => PipelineError::BrickNotFound { id },
        })?;

        let args = self.renderer.render_config(&step.config, ctx)?;

        self.record_entry(TraceEntry {
            run_id,
            instance_id: step.instance_id,
            brick_id: step.id.clone(),
            step_index,
            started_at: Utc::now(),
            args: args.redacted_json(),
        })
        .await;

        let options = BrickOptions::new(run_id, Arc::clone(&self.platform), abort, runner);
        let result = brick.run(args, &options).await;

        match result {
            Ok(output) => {
                self.record_exit(
                    run_id,
                    step.instance_id,
                    TraceOutcome::Success {
                        output: output.clone(),
                    },
                )
                .await;

                let bound_key = step
                    .output_key
                    .as_deref()
                    .or_else(|| brick.default_output_key())
                    .map(|key| format!("@{key}"));
                Ok(StepOutcome::Completed { output, bound_key })
            }
            Err(BrickError::Cancelled) => {
                self.record_exit(run_id, step.instance_id, TraceOutcome::Cancelled)
                    .await;
                Err(PipelineError::Cancelled)
            }
            Err(err) => {
                self.record_exit(
                    run_id,
                    step.instance_id,
                    TraceOutcome::Failure {
                        error: err.to_string(),
                    },
                )
                .await;
                Err(PipelineError::Brick {
                    step: step.label.clone().unwrap_or_else(|| step.id.clone()),
                    source: err,
                })
            }
        }
    }

    async fn trace_skip(&self, run_id: Uuid, step_index: usize, step: &BrickInvocation) {
        self.record_entry(TraceEntry {
            run_id,
            instance_id: step.instance_id,
            brick_id: step.id.clone(),
            step_index,
            started_at: Utc::now(),
            args: Value::Null,
        })
        .await;
        self.record_exit(run_id, step.instance_id, TraceOutcome::Skipped)
            .await;
    }

    async fn record_entry(&self, entry: TraceEntry) {
        if let Err(err) = self.recorder.record_entry(entry).await {
            warn!(error = %err, "trace entry not recorded");
        }
    }

    async fn record_exit(&self, run_id: Uuid, instance_id: Uuid, outcome: TraceOutcome) {
        let exit = TraceExit {
            run_id,
            instance_id,
            finished_at: Utc::now(),
            outcome,
        };
        if let Err(err) = self.recorder.record_exit(exit).await {
            warn!(error = %err, "trace exit not recorded");
        }
    }
}
