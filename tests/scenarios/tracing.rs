//! Trace recording across a run

use crate::helpers::{assert_run_completed, Harness};
use brickrun::core::{BrickInvocation, ExecutionContext, Expression};
use brickrun::trace::{TraceOutcome, TraceRecorder};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_every_step_gets_entry_and_exit() {
    let harness = Harness::new();
    let steps = vec![
        BrickInvocation::new("echo")
            .with_output_key("a")
            .with_config("message", Expression::literal("one")),
        BrickInvocation::new("echo")
            .with_output_key("b")
            .with_condition(Expression::literal(false))
            .with_config("message", Expression::literal("skipped")),
        BrickInvocation::new("concat")
            .with_config("values", Expression::literal(json!(["x"]))),
    ];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    let records = harness.recorder.records_for_run(output.run_id);
    assert_eq!(records.len(), 3);

    for record in &records {
        assert!(record.finished_at.is_some(), "record left open");
    }
    assert!(matches!(
        records[0].outcome,
        Some(TraceOutcome::Success { .. })
    ));
    assert_eq!(records[1].outcome, Some(TraceOutcome::Skipped));
    assert_eq!(
        records[2].outcome,
        Some(TraceOutcome::Success {
            output: json!("x")
        })
    );
}

#[tokio::test]
async fn test_records_keyed_by_run_and_instance() {
    let harness = Harness::new();
    let step = BrickInvocation::new("echo")
        .with_output_key("out")
        .with_config("message", Expression::literal("hi"));
    let instance_id = step.instance_id;
    let steps = vec![step];

    let first = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    let second = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    assert_ne!(first.run_id, second.run_id);

    // Same instance id in both runs, different run ids keep them apart
    for run_id in [first.run_id, second.run_id] {
        let records = harness.recorder.records_for_run(run_id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, instance_id);
        assert_eq!(records[0].run_id, run_id);
    }
}

#[tokio::test]
async fn test_sub_pipeline_steps_trace_under_the_same_run() {
    let harness = Harness::new();
    let body = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::var("@element"))];
    let steps = vec![BrickInvocation::new("for-each")
        .with_config("elements", Expression::literal(json!([1, 2])))
        .with_config("body", Expression::Pipeline(body))];

    let output = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    let records = harness.recorder.records_for_run(output.run_id);
    // for-each entry plus one echo per element
    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().filter(|r| r.brick_id == "echo").count(),
        2
    );
}

#[tokio::test]
async fn test_failed_step_outcome_carries_the_error() {
    let harness = Harness::new();
    let steps = vec![BrickInvocation::new("fail")
        .with_config("message", Expression::literal("bad day"))];

    let result = harness.run(&steps, ExecutionContext::new()).await;
    assert!(result.is_err());

    let run_ids = harness.recorder.run_ids();
    assert_eq!(run_ids.len(), 1);
    let records = harness.recorder.records_for_run(run_ids[0]);
    match &records[0].outcome {
        Some(TraceOutcome::Failure { error }) => assert!(error.contains("bad day")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_clear_run_removes_only_that_run() {
    let harness = Harness::new();
    let steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("x"))];

    let first = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);
    let second = assert_run_completed(harness.run(&steps, ExecutionContext::new()).await);

    harness.recorder.clear_run(first.run_id).await.unwrap();
    assert!(harness.recorder.records_for_run(first.run_id).is_empty());
    assert_eq!(harness.recorder.records_for_run(second.run_id).len(), 1);
}

#[tokio::test]
async fn test_recorder_failure_does_not_fail_the_run() {
    use async_trait::async_trait;
    use brickrun::execution::{AbortSignal, PipelineRunner};
    use brickrun::platform::LocalPlatform;
    use brickrun::registry::builtin_registry;
    use brickrun::trace::{TraceEntry, TraceError, TraceExit};
    use std::sync::Arc;

    struct BrokenRecorder;

    #[async_trait]
    impl TraceRecorder for BrokenRecorder {
        async fn record_entry(&self, _entry: TraceEntry) -> Result<(), TraceError> {
            Err(TraceError("disk full".to_string()))
        }

        async fn record_exit(&self, _exit: TraceExit) -> Result<(), TraceError> {
            Err(TraceError("disk full".to_string()))
        }

        async fn clear_run(&self, _run_id: Uuid) -> Result<(), TraceError> {
            Err(TraceError("disk full".to_string()))
        }
    }

    let runner = Arc::new(PipelineRunner::with_recorder(
        Arc::new(builtin_registry()),
        Arc::new(LocalPlatform::new()),
        Arc::new(BrokenRecorder),
    ));
    let steps = vec![BrickInvocation::new("echo")
        .with_config("message", Expression::literal("still fine"))];

    let output = runner
        .run(&steps, ExecutionContext::new(), AbortSignal::never())
        .await
        .expect("run should survive a broken recorder");
    assert_eq!(output.last_output, json!({ "message": "still fine" }));
}
