//! Test utility functions for brickrun

use brickrun::core::{BrickInvocation, ExecutionContext, ModConfig, RunStatus};
use brickrun::execution::{
    AbortSignal, ExecutionEvent, PipelineError, PipelineOutput, PipelineRunner,
};
use brickrun::platform::LocalPlatform;
use brickrun::registry::{builtin_registry, BrickRegistry};
use brickrun::trace::InMemoryTraceRecorder;

use std::sync::{Arc, Mutex};

/// A pipeline runner wired to inspectable test doubles: a local platform,
/// an in-memory trace recorder, and an event log.
pub struct Harness {
    pub platform: Arc<LocalPlatform>,
    pub recorder: Arc<InMemoryTraceRecorder>,
    pub events: Arc<Mutex<Vec<ExecutionEvent>>>,
    runner: Arc<PipelineRunner>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_registry(builtin_registry())
    }

    pub fn with_registry(registry: BrickRegistry) -> Self {
        let platform = Arc::new(LocalPlatform::new());
        let recorder = Arc::new(InMemoryTraceRecorder::new());
        let events: Arc<Mutex<Vec<ExecutionEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&events);
        let runner = Arc::new(
            PipelineRunner::with_recorder(
                Arc::new(registry),
                Arc::clone(&platform) as Arc<dyn brickrun::platform::PlatformProtocol>,
                Arc::clone(&recorder) as Arc<dyn brickrun::trace::TraceRecorder>,
            )
            .on_event(move |event| sink.lock().unwrap().push(event.clone())),
        );

        Self {
            platform,
            recorder,
            events,
            runner,
        }
    }

    pub async fn run(
        &self,
        steps: &[BrickInvocation],
        ctx: ExecutionContext,
    ) -> Result<PipelineOutput, PipelineError> {
        Arc::clone(&self.runner)
            .run(steps, ctx, AbortSignal::never())
            .await
    }

    pub async fn run_with_signal(
        &self,
        steps: &[BrickInvocation],
        ctx: ExecutionContext,
        signal: AbortSignal,
    ) -> Result<PipelineOutput, PipelineError> {
        Arc::clone(&self.runner).run(steps, ctx, signal).await
    }

    /// Load a mod from YAML and run it with the given input values
    pub async fn run_yaml(
        &self,
        yaml: &str,
        input: &[(&str, &str)],
    ) -> Result<PipelineOutput, PipelineError> {
        let config = ModConfig::from_yaml(yaml).expect("mod YAML should parse");
        let steps = config.to_steps().expect("steps should convert");
        let input: Vec<(String, String)> = input
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ctx = config
            .initial_context(&input)
            .expect("initial context should build");
        self.run(&steps, ctx).await
    }

    /// Brick ids of completed steps, in event order (includes sub-runs)
    pub fn completed_bricks(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepCompleted { brick_id, .. } => Some(brick_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Brick ids of skipped steps, in event order
    pub fn skipped_bricks(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepSkipped { brick_id, .. } => Some(brick_id.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert a run completed, returning its output
pub fn assert_run_completed(result: Result<PipelineOutput, PipelineError>) -> PipelineOutput {
    let output = result.unwrap_or_else(|e| panic!("run should complete, but failed: {e}"));
    assert_eq!(output.state.status, RunStatus::Completed);
    output
}

/// Assert a run failed with an error message containing the given text
pub fn assert_run_failed(result: Result<PipelineOutput, PipelineError>, expected: &str) {
    match result {
        Ok(output) => panic!(
            "run should have failed, but completed with output: {}",
            output.last_output
        ),
        Err(err) => {
            let message = err.to_string();
            assert!(
                message.contains(expected),
                "error message:\n{message}\n\ndoes not contain:\n{expected}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickrun::core::Expression;
    use serde_json::json;

    #[tokio::test]
    async fn test_harness_records_events() {
        let harness = Harness::new();
        let steps = vec![BrickInvocation::new("echo")
            .with_config("message", Expression::literal("hi"))];

        let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
        assert_eq!(output.last_output, json!({ "message": "hi" }));
        assert_eq!(harness.completed_bricks(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn test_run_yaml() {
        let harness = Harness::new();
        let yaml = r#"
name: "Echo mod"
steps:
  - brick: "echo"
    config:
      message: { kind: var, value: "@input.text" }
"#;
        let output =
            assert_run_completed(harness.run_yaml(yaml, &[("text", "\"hello\"")]).await);
        assert_eq!(output.last_output, json!({ "message": "hello" }));
    }
}
